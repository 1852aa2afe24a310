//! Configuration shared between the host and storage plugins.

use crate::format::DataStorageFormat;
use std::path::{Path, PathBuf};

/// Name of the storage directory inside the data path.
pub const DATABASE_DIR: &str = "database";

/// Storage-related settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataStorageConfiguration {
    /// Format new databases are created with and existing ones must match.
    pub format: DataStorageFormat,
}

impl Default for DataStorageConfiguration {
    fn default() -> Self {
        Self {
            format: DataStorageFormat::Compact,
        }
    }
}

/// Read-only configuration handed to storage factories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonConfiguration {
    data_path: PathBuf,
    storage_path: PathBuf,
    data_storage: DataStorageConfiguration,
}

impl CommonConfiguration {
    /// Creates a configuration rooted at `data_path`, storing the engine
    /// files under `data_path/database`.
    pub fn new(data_path: impl Into<PathBuf>, data_storage: DataStorageConfiguration) -> Self {
        let data_path = data_path.into();
        Self {
            storage_path: data_path.join(DATABASE_DIR),
            data_path,
            data_storage,
        }
    }

    /// Overrides the storage path.
    #[must_use]
    pub fn with_storage_path(mut self, storage_path: impl Into<PathBuf>) -> Self {
        self.storage_path = storage_path.into();
        self
    }

    /// Directory holding the metadata file and the storage directory.
    #[must_use]
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Directory holding the engine files.
    #[must_use]
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Storage settings.
    #[must_use]
    pub fn data_storage(&self) -> &DataStorageConfiguration {
        &self.data_storage
    }
}

//! Host configuration.

use cairn_plugin_api::{CommonConfiguration, DataStorageConfiguration, DataStorageFormat};
use std::path::{Path, PathBuf};

/// Default data path.
pub const DEFAULT_DATA_PATH: &str = "./cairn-data";

/// Environment variable overriding the plugins directory.
pub const PLUGINS_DIR_ENV: &str = "CAIRN_PLUGINS_DIR";

/// Name of the plugins directory inside the data path.
pub const PLUGINS_DIR: &str = "plugins";

/// Default storage factory name.
pub const DEFAULT_STORAGE_FACTORY: &str = "lsm";

/// Configuration of a [`Host`](crate::Host).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfiguration {
    /// Root of everything the host writes.
    pub data_path: PathBuf,

    /// Explicit plugins directory; see [`HostConfiguration::plugins_dir`].
    pub plugins_dir: Option<PathBuf>,

    /// Name of the storage factory to use.
    pub storage_factory: String,

    /// Storage format.
    pub data_storage: DataStorageConfiguration,
}

impl Default for HostConfiguration {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            plugins_dir: None,
            storage_factory: DEFAULT_STORAGE_FACTORY.to_string(),
            data_storage: DataStorageConfiguration::default(),
        }
    }
}

impl HostConfiguration {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data path.
    #[must_use]
    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    /// Sets an explicit plugins directory.
    #[must_use]
    pub fn plugins_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugins_dir = Some(path.into());
        self
    }

    /// Sets the storage factory name.
    #[must_use]
    pub fn storage_factory(mut self, name: impl Into<String>) -> Self {
        self.storage_factory = name.into();
        self
    }

    /// Sets the storage format.
    #[must_use]
    pub fn format(mut self, format: DataStorageFormat) -> Self {
        self.data_storage.format = format;
        self
    }

    /// Resolves the plugins directory: the explicit one, else
    /// `$CAIRN_PLUGINS_DIR`, else `<data_path>/plugins`.
    #[must_use]
    pub fn resolved_plugins_dir(&self) -> PathBuf {
        self.plugins_dir
            .clone()
            .unwrap_or_else(|| default_plugins_dir(&self.data_path))
    }

    /// Configuration handed to storage factories.
    #[must_use]
    pub fn common_configuration(&self) -> CommonConfiguration {
        CommonConfiguration::new(&self.data_path, self.data_storage)
    }
}

/// `$CAIRN_PLUGINS_DIR` if set, else `<data_path>/plugins`.
#[must_use]
pub fn default_plugins_dir(data_path: &Path) -> PathBuf {
    std::env::var_os(PLUGINS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| data_path.join(PLUGINS_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HostConfiguration::default();
        assert_eq!(config.data_path, PathBuf::from("./cairn-data"));
        assert_eq!(config.storage_factory, "lsm");
        assert_eq!(config.data_storage.format, DataStorageFormat::Compact);
    }

    #[test]
    fn explicit_plugins_dir_wins() {
        let config = HostConfiguration::new()
            .data_path("/data")
            .plugins_dir("/opt/plugins");
        assert_eq!(config.resolved_plugins_dir(), PathBuf::from("/opt/plugins"));
    }

    #[test]
    fn storage_path_under_data_path() {
        let config = HostConfiguration::new()
            .data_path("/data")
            .format(DataStorageFormat::Archive);
        let common = config.common_configuration();
        assert_eq!(common.storage_path(), Path::new("/data/database"));
        assert_eq!(common.data_storage().format, DataStorageFormat::Archive);
    }
}

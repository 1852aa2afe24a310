//! Engine tuning for the storage plugin.

use cairn_engine::{ColumnFamilyOptions, EngineOptions, TransactionMode};
use cairn_plugin_api::{DataStorageFormat, SegmentIdentifier};
use std::path::{Path, PathBuf};

/// Default maximum number of open files.
pub const DEFAULT_MAX_OPEN_FILES: i32 = 1024;

/// Default per-segment cache capacity in bytes.
pub const DEFAULT_CACHE_CAPACITY: u64 = 134_217_728;

/// Default number of background workers.
pub const DEFAULT_BACKGROUND_THREAD_COUNT: usize = 4;

/// Default for the high-spec flag.
pub const DEFAULT_IS_HIGH_SPEC: bool = false;

/// Cache capacity of eligible segments on high-spec hosts (1 GiB).
pub const HIGH_SPEC_CACHE_CAPACITY: u64 = 1024 * 1024 * 1024;

/// Tuning supplied through the plugin's command-line options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LsmFactoryConfiguration {
    /// Maximum number of open files.
    pub max_open_files: i32,
    /// Per-segment cache capacity in bytes.
    pub cache_capacity: u64,
    /// Number of background workers.
    pub background_thread_count: usize,
    /// Whether the host has memory to spare for larger caches.
    pub high_spec: bool,
}

impl Default for LsmFactoryConfiguration {
    fn default() -> Self {
        Self {
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            background_thread_count: DEFAULT_BACKGROUND_THREAD_COUNT,
            high_spec: DEFAULT_IS_HIGH_SPEC,
        }
    }
}

impl LsmFactoryConfiguration {
    /// Sets the maximum number of open files.
    #[must_use]
    pub const fn max_open_files(mut self, value: i32) -> Self {
        self.max_open_files = value;
        self
    }

    /// Sets the per-segment cache capacity.
    #[must_use]
    pub const fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Sets the number of background workers.
    #[must_use]
    pub const fn background_thread_count(mut self, count: usize) -> Self {
        self.background_thread_count = count;
        self
    }

    /// Sets the high-spec flag.
    #[must_use]
    pub const fn high_spec(mut self, enabled: bool) -> Self {
        self.high_spec = enabled;
        self
    }
}

/// Full engine configuration: tuning plus the database directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsmConfiguration {
    database_dir: PathBuf,
    tuning: LsmFactoryConfiguration,
}

impl LsmConfiguration {
    /// Creates a configuration for the engine at `database_dir`.
    pub fn new(database_dir: impl Into<PathBuf>, tuning: LsmFactoryConfiguration) -> Self {
        Self {
            database_dir: database_dir.into(),
            tuning,
        }
    }

    /// Engine directory.
    #[must_use]
    pub fn database_dir(&self) -> &Path {
        &self.database_dir
    }

    /// Tuning values.
    #[must_use]
    pub fn tuning(&self) -> &LsmFactoryConfiguration {
        &self.tuning
    }

    /// Engine options for a database of `format`.
    ///
    /// `Archive` databases use pessimistic key locking; `Compact` databases
    /// use optimistic validation.
    #[must_use]
    pub fn engine_options(&self, format: DataStorageFormat) -> EngineOptions {
        let mode = match format {
            DataStorageFormat::Archive => TransactionMode::Pessimistic,
            DataStorageFormat::Compact => TransactionMode::Optimistic,
        };
        EngineOptions::new()
            .create_if_missing(true)
            .create_missing_column_families(true)
            .max_open_files(self.tuning.max_open_files)
            .background_threads(self.tuning.background_thread_count)
            .transaction_mode(mode)
    }

    /// Column family options for `segment`.
    #[must_use]
    pub fn family_options(&self, segment: &SegmentIdentifier) -> ColumnFamilyOptions {
        let cache = if self.tuning.high_spec && segment.is_eligible_for_high_spec_cache() {
            HIGH_SPEC_CACHE_CAPACITY
        } else {
            self.tuning.cache_capacity
        };
        ColumnFamilyOptions::default()
            .cache_size(cache)
            .blob_files(
                segment.contains_static_data(),
                segment.is_static_data_gc_enabled(),
            )
    }
}

//! Test fixtures and storage helpers.
//!
//! Provides convenience functions for opening storage in a temporary
//! directory and for writing metadata files by hand.

use cairn_core::{Host, HostConfiguration, PluginCatalog, ALL_SEGMENTS};
use cairn_lsm_plugin::{DatabaseMetadata, LsmFactoryConfiguration, LsmKeyValueStorageFactory};
use cairn_plugin_api::{
    CommonConfiguration, DataStorageConfiguration, DataStorageFormat, KeyValueStorageFactory,
    SegmentIdentifier, SegmentedKeyValueStorage,
};
use parking_lot::RwLock;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Storage opened through the `lsm` factory in a temporary directory.
pub struct TestStorage {
    /// The storage instance.
    pub storage: Arc<dyn SegmentedKeyValueStorage>,
    /// The factory that created it.
    pub factory: LsmKeyValueStorageFactory,
    temp_dir: TempDir,
}

impl TestStorage {
    /// Opens `COMPACT` storage over the host segment set.
    pub fn compact() -> Self {
        Self::open(DataStorageFormat::Compact)
    }

    /// Opens `ARCHIVE` storage over the host segment set.
    pub fn archive() -> Self {
        Self::open(DataStorageFormat::Archive)
    }

    /// Opens storage in `format` over the host segment set.
    pub fn open(format: DataStorageFormat) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let factory = lsm_factory(&ALL_SEGMENTS);
        let storage = factory
            .create(&ALL_SEGMENTS, &common_configuration(temp_dir.path(), format))
            .expect("Failed to create storage");
        Self {
            storage,
            factory,
            temp_dir,
        }
    }

    /// The data path.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl std::ops::Deref for TestStorage {
    type Target = dyn SegmentedKeyValueStorage;

    fn deref(&self) -> &Self::Target {
        self.storage.as_ref()
    }
}

/// Runs a test with temporary `COMPACT` storage.
///
/// # Example
///
/// ```rust,ignore
/// use cairn_testkit::with_temp_storage;
///
/// #[test]
/// fn my_test() {
///     with_temp_storage(|storage| {
///         let mut txn = storage.start_transaction().unwrap();
///         // ... test operations
///     });
/// }
/// ```
pub fn with_temp_storage<F, R>(f: F) -> R
where
    F: FnOnce(&dyn SegmentedKeyValueStorage) -> R,
{
    let test_storage = TestStorage::compact();
    f(test_storage.storage.as_ref())
}

/// Runs a test with temporary storage in every format.
pub fn with_each_format<F>(mut f: F)
where
    F: FnMut(DataStorageFormat, &dyn SegmentedKeyValueStorage),
{
    for format in DataStorageFormat::ALL {
        let test_storage = TestStorage::open(format);
        f(format, test_storage.storage.as_ref());
    }
}

/// A factory for `segments` with default tuning.
pub fn lsm_factory(segments: &[SegmentIdentifier]) -> LsmKeyValueStorageFactory {
    LsmKeyValueStorageFactory::new(
        Arc::new(RwLock::new(LsmFactoryConfiguration::default())),
        segments.to_vec(),
        Vec::new(),
    )
}

/// Factory configuration for `data_path` in `format`.
pub fn common_configuration(data_path: &Path, format: DataStorageFormat) -> CommonConfiguration {
    CommonConfiguration::new(data_path, DataStorageConfiguration { format })
}

/// Writes a metadata file into `data_path`, creating the directory.
pub fn write_metadata(data_path: &Path, format: DataStorageFormat, version: u32) {
    fs::create_dir_all(data_path).expect("Failed to create data path");
    DatabaseMetadata::new(format, version)
        .write_to_directory(data_path)
        .expect("Failed to write metadata");
}

/// Puts `(key, value)` pairs into `segment` in one transaction.
pub fn put_all<S>(storage: &S, segment: &SegmentIdentifier, entries: &[(&[u8], &[u8])])
where
    S: SegmentedKeyValueStorage + ?Sized,
{
    let mut txn = storage
        .start_transaction()
        .expect("Failed to start transaction");
    for (key, value) in entries {
        txn.put(segment, key, value).expect("Failed to put");
    }
    txn.commit().expect("Failed to commit");
}

/// Every key of `segment`, in order.
pub fn keys_of<S>(storage: &S, segment: &SegmentIdentifier) -> Vec<Vec<u8>>
where
    S: SegmentedKeyValueStorage + ?Sized,
{
    storage
        .stream_keys(segment)
        .expect("Failed to stream keys")
        .collect()
}

/// A host in a temporary directory, registered and started with the
/// built-in plugins.
pub struct TestHost {
    /// The host.
    pub host: Host,
    /// The configuration it was started with.
    pub configuration: HostConfiguration,
    _temp_dir: TempDir,
}

impl TestHost {
    /// Registers and starts a host storing data in `format`.
    pub fn start(format: DataStorageFormat) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let configuration = HostConfiguration::new()
            .data_path(temp_dir.path())
            .format(format);
        let mut host = Host::new(PluginCatalog::builtin());
        host.register_plugins(None)
            .expect("Failed to register plugins");
        host.start(&configuration).expect("Failed to start host");
        Self {
            host,
            configuration,
            _temp_dir: temp_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::MARKET_DATA;

    #[test]
    fn test_storage_round_trip() {
        let storage = TestStorage::archive();
        put_all(&*storage, &MARKET_DATA, &[(b"a", b"1"), (b"b", b"2")]);
        assert_eq!(keys_of(&*storage, &MARKET_DATA), vec![b"a".to_vec(), b"b".to_vec()]);
        assert!(DatabaseMetadata::is_present(storage.path()));
    }

    #[test]
    fn test_host_starts() {
        let mut test_host = TestHost::start(DataStorageFormat::Compact);
        assert!(test_host.host.provider().is_ok());
        test_host.host.shutdown().unwrap();
    }
}

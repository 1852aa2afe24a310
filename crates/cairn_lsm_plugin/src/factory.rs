//! The `lsm` storage factory.

use crate::columnar::LsmColumnarKeyValueStorage;
use crate::config::{LsmConfiguration, LsmFactoryConfiguration};
use crate::format::VersionedStorageFormat;
use crate::metadata::{self, DatabaseMetadata};
use cairn_plugin_api::{
    CommonConfiguration, DataStorageFormat, KeyValueStorageFactory, SegmentIdentifier,
    SegmentedKeyValueStorage, StorageError, StorageResult,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::debug;

/// Name the factory is registered under.
pub const FACTORY_NAME: &str = "lsm";

struct Created {
    metadata: DatabaseMetadata,
    storage: Arc<LsmColumnarKeyValueStorage>,
}

/// Creates the engine-backed segmented storage.
///
/// The storage is created on the first successful [`create`] call and the
/// same instance is returned afterwards. Engine tuning is read from the
/// shared configuration at creation time, after the command line has been
/// applied.
///
/// [`create`]: KeyValueStorageFactory::create
pub struct LsmKeyValueStorageFactory {
    configuration: Arc<RwLock<LsmFactoryConfiguration>>,
    configured_segments: Vec<SegmentIdentifier>,
    ignorable_segments: Vec<SegmentIdentifier>,
    created: Mutex<Option<Created>>,
}

impl LsmKeyValueStorageFactory {
    /// Creates a factory for `configured_segments`.
    ///
    /// Segments in `ignorable_segments` are only opened when they already
    /// exist on disk.
    pub fn new(
        configuration: Arc<RwLock<LsmFactoryConfiguration>>,
        configured_segments: Vec<SegmentIdentifier>,
        ignorable_segments: Vec<SegmentIdentifier>,
    ) -> Self {
        Self {
            configuration,
            configured_segments,
            ignorable_segments,
            created: Mutex::new(None),
        }
    }

    /// Metadata of the database, once created.
    #[must_use]
    pub fn metadata(&self) -> Option<DatabaseMetadata> {
        self.created.lock().as_ref().map(|created| created.metadata)
    }

    fn check_configured(&self, segments: &[SegmentIdentifier]) -> StorageResult<()> {
        let unconfigured: Vec<&str> = segments
            .iter()
            .filter(|segment| !self.configured_segments.contains(segment))
            .map(SegmentIdentifier::name)
            .collect();
        if unconfigured.is_empty() {
            Ok(())
        } else {
            Err(StorageError::SegmentsNotConfigured {
                segments: unconfigured.join(", "),
            })
        }
    }

    fn open(
        &self,
        metadata: &DatabaseMetadata,
        config: &CommonConfiguration,
    ) -> StorageResult<LsmColumnarKeyValueStorage> {
        let format = metadata.format();
        match format {
            DataStorageFormat::Archive => {
                debug!("ARCHIVE mode detected, using pessimistic engine");
            }
            DataStorageFormat::Compact => {
                debug!("COMPACT mode detected, using optimistic engine");
            }
        }

        let segments: Vec<SegmentIdentifier> = self
            .configured_segments
            .iter()
            .filter(|segment| segment.include_in_database_format(format))
            .copied()
            .collect();
        let configuration = LsmConfiguration::new(config.storage_path(), *self.configuration.read());
        LsmColumnarKeyValueStorage::open(configuration, format, &segments, &self.ignorable_segments)
    }
}

impl KeyValueStorageFactory for LsmKeyValueStorageFactory {
    fn name(&self) -> &str {
        FACTORY_NAME
    }

    fn create(
        &self,
        segments: &[SegmentIdentifier],
        config: &CommonConfiguration,
    ) -> StorageResult<Arc<dyn SegmentedKeyValueStorage>> {
        let mut created = self.created.lock();
        if let Some(existing) = created.as_ref() {
            if existing.storage.is_closed() {
                return Err(StorageError::illegal_state("Storage has been closed"));
            }
            self.check_configured(segments)?;
            return Ok(Arc::clone(&existing.storage) as Arc<dyn SegmentedKeyValueStorage>);
        }

        let metadata = metadata::initialize(config)?;
        self.check_configured(segments)?;
        let storage = Arc::new(self.open(&metadata, config)?);
        *created = Some(Created {
            metadata,
            storage: Arc::clone(&storage),
        });
        Ok(storage)
    }

    fn is_segment_isolation_supported(&self) -> bool {
        true
    }

    fn close(&self) -> StorageResult<()> {
        debug!(factory = FACTORY_NAME, "storage factory closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_plugin_api::DataStorageConfiguration;
    use tempfile::tempdir;

    const ONE: SegmentIdentifier = SegmentIdentifier::new("ONE", &[1]);
    const ARCHIVE_ONLY: SegmentIdentifier =
        SegmentIdentifier::new("ARCHIVE_ONLY", &[2]).with_formats(&[DataStorageFormat::Archive]);
    const STRAY: SegmentIdentifier = SegmentIdentifier::new("STRAY", &[9]);

    fn factory() -> LsmKeyValueStorageFactory {
        LsmKeyValueStorageFactory::new(
            Arc::new(RwLock::new(LsmFactoryConfiguration::default())),
            vec![ONE, ARCHIVE_ONLY],
            Vec::new(),
        )
    }

    fn config(data_path: &std::path::Path, format: DataStorageFormat) -> CommonConfiguration {
        CommonConfiguration::new(data_path, DataStorageConfiguration { format })
    }

    #[test]
    fn create_returns_the_same_instance() {
        let dir = tempdir().unwrap();
        let factory = factory();
        let config = config(dir.path(), DataStorageFormat::Compact);

        let first = factory.create(&[ONE], &config).unwrap();
        let second = factory.create(&[ONE], &config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            factory.metadata(),
            Some(DatabaseMetadata::new(DataStorageFormat::Compact, 2))
        );
        assert!(DatabaseMetadata::is_present(dir.path()));
        assert!(config.storage_path().is_dir());
    }

    #[test]
    fn create_after_close_is_rejected() {
        let dir = tempdir().unwrap();
        let factory = factory();
        let config = config(dir.path(), DataStorageFormat::Compact);

        factory.create(&[ONE], &config).unwrap().close().unwrap();
        let err = factory.create(&[ONE], &config).err().unwrap();
        assert!(matches!(err, StorageError::IllegalState { .. }));
        assert_eq!(err.to_string(), "Storage has been closed");
    }

    #[test]
    fn unconfigured_segments_are_rejected() {
        let dir = tempdir().unwrap();
        let factory = factory();
        let err = factory
            .create(&[ONE, STRAY], &config(dir.path(), DataStorageFormat::Compact))
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "Attempted to create storage for segments that are not configured: STRAY"
        );
    }

    #[test]
    fn format_filters_segments() {
        let dir = tempdir().unwrap();
        let factory = factory();
        factory
            .create(&[ONE], &config(dir.path(), DataStorageFormat::Compact))
            .unwrap();
        let created = factory.created.lock();
        let segments = created.as_ref().unwrap().storage.segments();
        assert_eq!(segments, vec![ONE]);
    }

    #[test]
    fn archive_storage_is_not_snappable() {
        let dir = tempdir().unwrap();
        let storage = factory()
            .create(&[ONE], &config(dir.path(), DataStorageFormat::Archive))
            .unwrap();
        assert!(storage.as_snappable().is_none());
    }

    #[test]
    fn single_segment_storage() {
        let dir = tempdir().unwrap();
        let factory = factory();
        let storage = factory
            .create_single(&ONE, &config(dir.path(), DataStorageFormat::Compact))
            .unwrap();

        let mut txn = storage.start_transaction().unwrap();
        txn.put(b"k", b"v").unwrap();
        txn.commit().unwrap();
        assert_eq!(storage.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn tuning_is_read_at_creation() {
        let dir = tempdir().unwrap();
        let tuning = Arc::new(RwLock::new(LsmFactoryConfiguration::default()));
        let factory = LsmKeyValueStorageFactory::new(Arc::clone(&tuning), vec![ONE], Vec::new());
        tuning.write().max_open_files = 77;

        factory
            .create(&[ONE], &config(dir.path(), DataStorageFormat::Compact))
            .unwrap();
        let created = factory.created.lock();
        let engine = created.as_ref().unwrap().storage.engine();
        assert_eq!(engine.options().max_open_files, 77);
    }
}

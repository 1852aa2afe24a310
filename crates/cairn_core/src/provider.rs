//! Storage provider.
//!
//! The provider is the host-side entry point to storage: it asks the
//! configured factory for a storage instance once per distinct segment list
//! and hands out the cached instance afterwards.

use crate::error::{CoreError, CoreResult};
use cairn_plugin_api::{
    CommonConfiguration, KeyValueStorageFactory, SegmentIdentifier, SegmentedKeyValueStorage,
    SegmentedKeyValueStorageAdapter, StorageResult,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Creates a storage instance for a list of segments.
pub type StorageCreator =
    Box<dyn Fn(&[SegmentIdentifier]) -> StorageResult<Arc<dyn SegmentedKeyValueStorage>> + Send + Sync>;

/// Hands out storage by segment.
pub trait StorageProvider: Send + Sync {
    /// Storage for a single segment.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if the storage cannot be created.
    fn storage_by_segment(
        &self,
        segment: &SegmentIdentifier,
    ) -> CoreResult<SegmentedKeyValueStorageAdapter>;

    /// Storage spanning `segments`.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if the storage cannot be created.
    fn storage_by_segments(
        &self,
        segments: &[SegmentIdentifier],
    ) -> CoreResult<Arc<dyn SegmentedKeyValueStorage>>;

    /// Closes every storage handed out so far.
    ///
    /// # Errors
    ///
    /// Failures are logged, not returned; the result is reserved for
    /// implementations that cannot continue.
    fn close(&self) -> CoreResult<()>;
}

/// [`StorageProvider`] caching one storage per segment list.
pub struct KeyValueStorageProvider {
    creator: StorageCreator,
    segments: Vec<SegmentIdentifier>,
    storages: Mutex<HashMap<Vec<SegmentIdentifier>, Arc<dyn SegmentedKeyValueStorage>>>,
}

impl KeyValueStorageProvider {
    /// Creates a provider over `creator`. `segments` is the set the host
    /// knows about.
    pub fn new(creator: StorageCreator, segments: Vec<SegmentIdentifier>) -> Self {
        Self {
            creator,
            segments,
            storages: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder() -> KeyValueStorageProviderBuilder {
        KeyValueStorageProviderBuilder::default()
    }

    /// Segments the host knows about.
    #[must_use]
    pub fn segments(&self) -> &[SegmentIdentifier] {
        &self.segments
    }

    /// Number of distinct storages created.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.storages.lock().len()
    }
}

impl StorageProvider for KeyValueStorageProvider {
    fn storage_by_segment(
        &self,
        segment: &SegmentIdentifier,
    ) -> CoreResult<SegmentedKeyValueStorageAdapter> {
        let storage = self.storage_by_segments(std::slice::from_ref(segment))?;
        Ok(SegmentedKeyValueStorageAdapter::new(*segment, storage))
    }

    fn storage_by_segments(
        &self,
        segments: &[SegmentIdentifier],
    ) -> CoreResult<Arc<dyn SegmentedKeyValueStorage>> {
        let mut storages = self.storages.lock();
        if let Some(storage) = storages.get(segments) {
            return Ok(Arc::clone(storage));
        }
        let storage = (self.creator)(segments)?;
        storages.insert(segments.to_vec(), Arc::clone(&storage));
        Ok(storage)
    }

    fn close(&self) -> CoreResult<()> {
        for (segments, storage) in self.storages.lock().drain() {
            if let Err(err) = storage.close() {
                let names: Vec<&str> = segments.iter().map(SegmentIdentifier::name).collect();
                warn!(
                    error = %err,
                    "Failed to close storage for segments {}",
                    names.join(",")
                );
            }
        }
        Ok(())
    }
}

/// Wires a [`KeyValueStorageProvider`] to a factory.
#[derive(Default)]
pub struct KeyValueStorageProviderBuilder {
    factory: Option<Arc<dyn KeyValueStorageFactory>>,
    configuration: Option<CommonConfiguration>,
    segments: Vec<SegmentIdentifier>,
}

impl KeyValueStorageProviderBuilder {
    /// Sets the storage factory.
    #[must_use]
    pub fn factory(mut self, factory: Arc<dyn KeyValueStorageFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the configuration handed to the factory.
    #[must_use]
    pub fn configuration(mut self, configuration: CommonConfiguration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Sets the known segments.
    #[must_use]
    pub fn segments(mut self, segments: impl IntoIterator<Item = SegmentIdentifier>) -> Self {
        self.segments = segments.into_iter().collect();
        self
    }

    /// Builds the provider.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if the factory or configuration
    /// is missing.
    pub fn build(self) -> CoreResult<KeyValueStorageProvider> {
        let factory = self
            .factory
            .ok_or_else(|| CoreError::configuration("storage provider needs a factory"))?;
        let configuration = self
            .configuration
            .ok_or_else(|| CoreError::configuration("storage provider needs a configuration"))?;
        let creator: StorageCreator =
            Box::new(move |segments| factory.create(segments, &configuration));
        Ok(KeyValueStorageProvider::new(creator, self.segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::{ALL_SEGMENTS, BLOTTER, MARKET_DATA};
    use cairn_lsm_plugin::{LsmFactoryConfiguration, LsmKeyValueStorageFactory};
    use cairn_plugin_api::{
        DataStorageConfiguration, KeyValueStorage, KeyValueStorageTransaction, StorageError,
    };
    use parking_lot::RwLock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn lsm_factory() -> Arc<dyn KeyValueStorageFactory> {
        Arc::new(LsmKeyValueStorageFactory::new(
            Arc::new(RwLock::new(LsmFactoryConfiguration::default())),
            ALL_SEGMENTS.to_vec(),
            Vec::new(),
        ))
    }

    #[test]
    fn builder_requires_factory_and_configuration() {
        let err = KeyValueStorageProvider::builder().build().err().unwrap();
        assert!(matches!(err, CoreError::Configuration { .. }));

        let err = KeyValueStorageProvider::builder()
            .factory(lsm_factory())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn storages_are_cached_per_segment_list() {
        let created = Arc::new(AtomicUsize::new(0));
        let dir = tempdir().unwrap();
        let factory = lsm_factory();
        let config = CommonConfiguration::new(dir.path(), DataStorageConfiguration::default());
        let counter = Arc::clone(&created);
        let provider = KeyValueStorageProvider::new(
            Box::new(move |segments| {
                counter.fetch_add(1, Ordering::SeqCst);
                factory.create(segments, &config)
            }),
            ALL_SEGMENTS.to_vec(),
        );

        let first = provider.storage_by_segments(&[MARKET_DATA, BLOTTER]).unwrap();
        let again = provider.storage_by_segments(&[MARKET_DATA, BLOTTER]).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        provider.storage_by_segment(&MARKET_DATA).unwrap();
        provider.storage_by_segment(&MARKET_DATA).unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(provider.cached(), 2);
    }

    #[test]
    fn single_segment_adapter_reads_and_writes() {
        let dir = tempdir().unwrap();
        let provider = KeyValueStorageProvider::builder()
            .factory(lsm_factory())
            .configuration(CommonConfiguration::new(
                dir.path(),
                DataStorageConfiguration::default(),
            ))
            .segments(ALL_SEGMENTS)
            .build()
            .unwrap();

        let storage = provider.storage_by_segment(&BLOTTER).unwrap();
        let mut txn = storage.start_transaction().unwrap();
        txn.put(b"order-1", b"filled").unwrap();
        txn.commit().unwrap();
        assert_eq!(storage.get(b"order-1").unwrap(), Some(b"filled".to_vec()));

        provider.close().unwrap();
        assert!(storage.is_closed());
        assert_eq!(provider.cached(), 0);
    }

    #[test]
    fn creator_errors_are_returned() {
        let provider = KeyValueStorageProvider::new(
            Box::new(|_| Err(StorageError::Unsupported { operation: "create" })),
            Vec::new(),
        );
        let err = provider.storage_by_segment(&BLOTTER).err().unwrap();
        assert_eq!(err.to_string(), "create is not supported");
        assert_eq!(provider.cached(), 0);
    }
}

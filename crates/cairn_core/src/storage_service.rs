//! Registry of storage factories.

use crate::segments::ALL_SEGMENTS;
use cairn_plugin_api::{KeyValueStorageFactory, SegmentIdentifier, StorageService};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// The host's [`StorageService`].
#[derive(Default)]
pub struct StorageServiceImpl {
    factories: RwLock<HashMap<String, Arc<dyn KeyValueStorageFactory>>>,
}

impl StorageServiceImpl {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the registered factories, sorted.
    #[must_use]
    pub fn factory_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl StorageService for StorageServiceImpl {
    fn register_key_value_storage(&self, factory: Arc<dyn KeyValueStorageFactory>) {
        let name = factory.name().to_string();
        debug!(factory = %name, "Registering storage factory");
        self.factories.write().insert(name, factory);
    }

    fn all_segment_identifiers(&self) -> Vec<SegmentIdentifier> {
        ALL_SEGMENTS.to_vec()
    }

    fn get_by_name(&self, name: &str) -> Option<Arc<dyn KeyValueStorageFactory>> {
        self.factories.read().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_plugin_api::{CommonConfiguration, SegmentedKeyValueStorage, StorageError, StorageResult};
    use std::thread;

    struct Named(&'static str, u32);

    impl KeyValueStorageFactory for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn create(
            &self,
            _: &[SegmentIdentifier],
            _: &CommonConfiguration,
        ) -> StorageResult<Arc<dyn SegmentedKeyValueStorage>> {
            Err(StorageError::Unsupported { operation: "create" })
        }

        fn is_segment_isolation_supported(&self) -> bool {
            self.1 % 2 == 0
        }

        fn close(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    #[test]
    fn last_registration_wins() {
        let service = StorageServiceImpl::new();
        service.register_key_value_storage(Arc::new(Named("lsm", 1)));
        service.register_key_value_storage(Arc::new(Named("lsm", 2)));

        let factory = service.get_by_name("lsm").unwrap();
        assert!(factory.is_segment_isolation_supported());
        assert_eq!(service.factory_names(), vec!["lsm".to_string()]);
        assert!(service.get_by_name("memory").is_none());
    }

    #[test]
    fn concurrent_registration() {
        let service = Arc::new(StorageServiceImpl::new());
        let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let handles: Vec<_> = names
            .into_iter()
            .map(|name| {
                let service = Arc::clone(&service);
                thread::spawn(move || service.register_key_value_storage(Arc::new(Named(name, 0))))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(service.factory_names().len(), names.len());
    }

    #[test]
    fn segments_are_the_host_set() {
        let service = StorageServiceImpl::new();
        assert_eq!(service.all_segment_identifiers(), ALL_SEGMENTS.to_vec());
    }
}

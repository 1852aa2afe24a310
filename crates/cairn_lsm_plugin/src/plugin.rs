//! The `lsm` plugin.

use crate::cli::{LsmCliOptions, NAMESPACE};
use crate::factory::LsmKeyValueStorageFactory;
use cairn_plugin_api::{
    CliOptions, KeyValueStorageFactory, Plugin, PluginError, SegmentIdentifier, ServiceRegistry,
    StorageService,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Plugin name.
pub const PLUGIN_NAME: &str = "lsm";

/// Registers the `lsm` storage factory and its command-line options.
pub struct LsmPlugin {
    options: Arc<LsmCliOptions>,
    ignorable_segments: Vec<SegmentIdentifier>,
    storage_service: Option<Arc<dyn StorageService>>,
    factory: Option<Arc<LsmKeyValueStorageFactory>>,
}

impl Default for LsmPlugin {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl LsmPlugin {
    /// Creates the plugin. `ignorable_segments` are only opened when they
    /// already exist on disk.
    #[must_use]
    pub fn new(ignorable_segments: Vec<SegmentIdentifier>) -> Self {
        Self {
            options: Arc::new(LsmCliOptions::new()),
            ignorable_segments,
            storage_service: None,
            factory: None,
        }
    }

    /// The factory registered with the storage service, if any.
    #[must_use]
    pub fn factory(&self) -> Option<Arc<LsmKeyValueStorageFactory>> {
        self.factory.clone()
    }

    fn create_and_register_factory(&mut self) {
        let Some(service) = self.storage_service.as_ref() else {
            error!("Failed to register storage factory due to missing StorageService");
            return;
        };
        let factory = Arc::new(LsmKeyValueStorageFactory::new(
            self.options.configuration(),
            service.all_segment_identifiers(),
            self.ignorable_segments.clone(),
        ));
        service.register_key_value_storage(Arc::clone(&factory) as Arc<dyn KeyValueStorageFactory>);
        self.factory = Some(factory);
    }
}

impl Plugin for LsmPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn title(&self) -> &str {
        env!("CARGO_PKG_NAME")
    }

    fn version(&self) -> Option<&str> {
        Some(env!("CARGO_PKG_VERSION"))
    }

    fn register(&mut self, services: &ServiceRegistry) -> Result<(), PluginError> {
        debug!("Registering plugin");

        let cli_options = services
            .get_service::<dyn CliOptions>()
            .ok_or(PluginError::ServiceUnavailable {
                service: "CliOptions",
            })?;
        cli_options.add_cli_options(NAMESPACE, Arc::clone(&self.options) as _)?;

        self.storage_service = services.get_service::<dyn StorageService>();
        self.create_and_register_factory();

        debug!("Plugin registered");
        Ok(())
    }

    fn start(&mut self) -> Result<(), PluginError> {
        debug!("Starting plugin");
        if self.factory.is_none() {
            self.create_and_register_factory();
        }
        let configuration = *self.options.configuration().read();
        info!(?configuration, "lsm storage configured");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PluginError> {
        debug!("Stopping plugin");
        if let Some(factory) = self.factory.take() {
            if let Err(err) = factory.close() {
                error!(error = %err, "Failed to stop plugin");
                return Err(err.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_plugin_api::CliOptionGroup;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    const ONE: SegmentIdentifier = SegmentIdentifier::new("ONE", &[1]);

    #[derive(Default)]
    struct Storages {
        factories: Mutex<HashMap<String, Arc<dyn KeyValueStorageFactory>>>,
    }

    impl StorageService for Storages {
        fn register_key_value_storage(&self, factory: Arc<dyn KeyValueStorageFactory>) {
            self.factories
                .lock()
                .insert(factory.name().to_string(), factory);
        }

        fn all_segment_identifiers(&self) -> Vec<SegmentIdentifier> {
            vec![ONE]
        }

        fn get_by_name(&self, name: &str) -> Option<Arc<dyn KeyValueStorageFactory>> {
            self.factories.lock().get(name).cloned()
        }
    }

    #[derive(Default)]
    struct Options {
        groups: Mutex<Vec<(String, Arc<dyn CliOptionGroup>)>>,
    }

    impl CliOptions for Options {
        fn add_cli_options(
            &self,
            namespace: &str,
            options: Arc<dyn CliOptionGroup>,
        ) -> Result<(), PluginError> {
            self.groups.lock().push((namespace.to_string(), options));
            Ok(())
        }
    }

    #[test]
    fn register_adds_options_and_factory() {
        let services = ServiceRegistry::new();
        let storages = Arc::new(Storages::default());
        let options = Arc::new(Options::default());
        services.add_service::<dyn StorageService>(storages.clone());
        services.add_service::<dyn CliOptions>(options.clone());

        let mut plugin = LsmPlugin::default();
        plugin.register(&services).unwrap();

        assert_eq!(options.groups.lock()[0].0, "lsm");
        assert!(storages.get_by_name("lsm").is_some());
        assert!(plugin.factory().is_some());
    }

    #[test]
    fn register_requires_cli_options() {
        let services = ServiceRegistry::new();
        let mut plugin = LsmPlugin::default();
        let err = plugin.register(&services).unwrap_err();
        assert!(matches!(err, PluginError::ServiceUnavailable { .. }));
    }

    #[test]
    fn missing_storage_service_is_not_fatal() {
        let services = ServiceRegistry::new();
        services.add_service::<dyn CliOptions>(Arc::new(Options::default()));

        let mut plugin = LsmPlugin::default();
        plugin.register(&services).unwrap();
        assert!(plugin.factory().is_none());
        plugin.start().unwrap();
        assert!(plugin.factory().is_none());
    }

    #[test]
    fn stop_then_start_recreates_factory() {
        let services = ServiceRegistry::new();
        let storages = Arc::new(Storages::default());
        services.add_service::<dyn StorageService>(storages.clone());
        services.add_service::<dyn CliOptions>(Arc::new(Options::default()));

        let mut plugin = LsmPlugin::default();
        plugin.register(&services).unwrap();
        plugin.stop().unwrap();
        assert!(plugin.factory().is_none());

        plugin.start().unwrap();
        assert!(plugin.factory().is_some());
    }
}

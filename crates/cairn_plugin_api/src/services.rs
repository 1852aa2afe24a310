//! Host capabilities exposed to plugins.

use crate::error::PluginError;
use crate::factory::KeyValueStorageFactory;
use crate::segment::SegmentIdentifier;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Marker for capability types that can live in a [`ServiceRegistry`].
///
/// Implemented by the capability trait objects (`dyn StorageService`,
/// `dyn CliOptions`), so concrete types can only be registered through the
/// capability they provide.
pub trait Service: Send + Sync + 'static {}

/// Registry of host services keyed by capability type.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` as the provider of capability `S`, replacing any
    /// previous provider.
    pub fn add_service<S: ?Sized + Service>(&self, service: Arc<S>) {
        self.services
            .write()
            .insert(TypeId::of::<S>(), Box::new(service));
    }

    /// Returns the provider of capability `S`, if one is registered.
    #[must_use]
    pub fn get_service<S: ?Sized + Service>(&self) -> Option<Arc<S>> {
        self.services
            .read()
            .get(&TypeId::of::<S>())
            .and_then(|service| service.downcast_ref::<Arc<S>>())
            .cloned()
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.len())
            .finish()
    }
}

/// Directory of storage factories.
pub trait StorageService: Send + Sync {
    /// Registers `factory` under its name. The last registration wins.
    fn register_key_value_storage(&self, factory: Arc<dyn KeyValueStorageFactory>);

    /// Every segment the host knows about.
    fn all_segment_identifiers(&self) -> Vec<SegmentIdentifier>;

    /// Looks a factory up by name.
    fn get_by_name(&self, name: &str) -> Option<Arc<dyn KeyValueStorageFactory>>;
}

impl Service for dyn StorageService {}

/// A group of plugin command-line options.
///
/// The host merges [`CliOptionGroup::args`] into its command before parsing
/// and hands the parsed matches back through [`CliOptionGroup::apply`].
pub trait CliOptionGroup: Send + Sync {
    /// Options to add to the host command.
    fn args(&self) -> Vec<clap::Arg>;

    /// Reads this group's values out of the parsed command line.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is rejected.
    fn apply(&self, matches: &clap::ArgMatches) -> Result<(), PluginError>;
}

/// Registration of plugin command-line options.
pub trait CliOptions: Send + Sync {
    /// Adds `options` under `namespace`.
    ///
    /// Every long option name must start with `--plugin-<namespace>-` or
    /// `--Xplugin-<namespace>-`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidCliOption`] naming every option that
    /// breaks the convention.
    fn add_cli_options(
        &self,
        namespace: &str,
        options: Arc<dyn CliOptionGroup>,
    ) -> Result<(), PluginError>;
}

impl Service for dyn CliOptions {}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    impl Service for dyn Greeter {}

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    struct French;

    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".into()
        }
    }

    #[test]
    fn missing_service_is_none() {
        let registry = ServiceRegistry::new();
        assert!(registry.get_service::<dyn Greeter>().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn later_registration_overwrites() {
        let registry = ServiceRegistry::new();
        registry.add_service::<dyn Greeter>(Arc::new(English));
        registry.add_service::<dyn Greeter>(Arc::new(French));

        let greeter = registry.get_service::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "bonjour");
        assert_eq!(registry.len(), 1);
    }
}

//! Plugin catalog and discovery.
//!
//! Plugins are compiled into the host and listed in a [`PluginCatalog`]. A
//! plugins directory selects which of them load: every `*.plugin` file in it
//! is a JSON descriptor naming one catalog entry, for example
//! `{"name": "lsm"}`. Without a plugins directory every catalog entry loads.

use crate::error::{CoreError, CoreResult};
use cairn_lsm_plugin::{LsmPlugin, PLUGIN_NAME as LSM_PLUGIN_NAME};
use cairn_plugin_api::Plugin;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// File extension of plugin descriptors.
pub const DESCRIPTOR_EXTENSION: &str = "plugin";

type Constructor = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

struct CatalogEntry {
    name: String,
    constructor: Constructor,
}

/// Plugins the host can instantiate, by name.
#[derive(Default)]
pub struct PluginCatalog {
    entries: Vec<CatalogEntry>,
}

impl PluginCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The plugins shipped with the host.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new().with(LSM_PLUGIN_NAME, || Box::new(LsmPlugin::default()))
    }

    /// Adds an entry, replacing any entry with the same name.
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let name = name.into();
        self.entries.retain(|entry| entry.name != name);
        self.entries.push(CatalogEntry {
            name,
            constructor: Box::new(constructor),
        });
        self
    }

    /// Entry names, in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    /// Instantiates the entry named `name`.
    #[must_use]
    pub fn instantiate(&self, name: &str) -> Option<Box<dyn Plugin>> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| (entry.constructor)())
    }

    /// Instantiates every entry.
    #[must_use]
    pub fn instantiate_all(&self) -> Vec<Box<dyn Plugin>> {
        self.entries
            .iter()
            .map(|entry| (entry.constructor)())
            .collect()
    }
}

/// Contents of a `*.plugin` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginDescriptor {
    /// Catalog entry to load.
    pub name: String,
}

impl PluginDescriptor {
    /// Parses the descriptor at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// [`CoreError::Descriptor`] if it is not a valid descriptor.
    pub fn read(path: &Path) -> CoreResult<Self> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|err| CoreError::Descriptor {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

/// Selects the plugins to load from a catalog.
pub trait PluginLoader {
    /// Instantiates the selected plugins.
    fn load(&self, catalog: &PluginCatalog) -> Vec<Box<dyn Plugin>>;
}

/// Loads every catalog entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinPluginLoader;

impl PluginLoader for BuiltinPluginLoader {
    fn load(&self, catalog: &PluginCatalog) -> Vec<Box<dyn Plugin>> {
        catalog.instantiate_all()
    }
}

/// Loads the catalog entries named by the descriptors in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryPluginLoader {
    dir: PathBuf,
}

impl DirectoryPluginLoader {
    /// Creates a loader for `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Reads every descriptor in the directory, sorted by file name.
    ///
    /// Descriptors that fail to parse are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn descriptors(&self) -> CoreResult<Vec<PluginDescriptor>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(DESCRIPTOR_EXTENSION)
            })
            .collect();
        paths.sort();

        let mut descriptors = Vec::with_capacity(paths.len());
        for path in paths {
            match PluginDescriptor::read(&path) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(err) => error!(error = %err, "Skipping unreadable plugin descriptor"),
            }
        }
        Ok(descriptors)
    }
}

impl PluginLoader for DirectoryPluginLoader {
    fn load(&self, catalog: &PluginCatalog) -> Vec<Box<dyn Plugin>> {
        let descriptors = match self.descriptors() {
            Ok(descriptors) => descriptors,
            Err(err) => {
                error!(error = %err, "Error enumerating plugins, could not load plugins");
                return BuiltinPluginLoader.load(catalog);
            }
        };

        descriptors
            .iter()
            .filter_map(|descriptor| {
                let plugin = catalog.instantiate(&descriptor.name);
                if plugin.is_none() {
                    warn!(
                        plugin = %descriptor.name,
                        dir = %self.dir.display(),
                        "Plugin descriptor names an unknown plugin"
                    );
                }
                plugin
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_plugin_api::{PluginError, ServiceRegistry};
    use tempfile::tempdir;

    struct Named(&'static str);

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn register(&mut self, _: &ServiceRegistry) -> Result<(), PluginError> {
            Ok(())
        }

        fn start(&mut self) -> Result<(), PluginError> {
            Ok(())
        }

        fn stop(&mut self) -> Result<(), PluginError> {
            Ok(())
        }
    }

    fn catalog() -> PluginCatalog {
        PluginCatalog::new()
            .with("alpha", || Box::new(Named("alpha")))
            .with("beta", || Box::new(Named("beta")))
    }

    fn names(plugins: &[Box<dyn Plugin>]) -> Vec<&str> {
        plugins.iter().map(|plugin| plugin.name()).collect()
    }

    #[test]
    fn builtin_catalog_has_lsm() {
        assert_eq!(PluginCatalog::builtin().names(), vec!["lsm"]);
    }

    #[test]
    fn builtin_loader_loads_everything() {
        let plugins = BuiltinPluginLoader.load(&catalog());
        assert_eq!(names(&plugins), vec!["alpha", "beta"]);
    }

    #[test]
    fn directory_loader_follows_descriptors() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.plugin"), r#"{"name":"alpha"}"#).unwrap();
        fs::write(dir.path().join("c.plugin"), r#"{"name":"gamma"}"#).unwrap();
        fs::write(dir.path().join("d.plugin"), "garbage").unwrap();
        fs::write(dir.path().join("a.txt"), r#"{"name":"beta"}"#).unwrap();

        let plugins = DirectoryPluginLoader::new(dir.path()).load(&catalog());
        assert_eq!(names(&plugins), vec!["alpha"]);
    }

    #[test]
    fn replacing_an_entry() {
        let catalog = catalog().with("alpha", || Box::new(Named("alpha2")));
        assert_eq!(catalog.names(), vec!["beta", "alpha"]);
        assert_eq!(catalog.instantiate("alpha").unwrap().name(), "alpha2");
    }
}

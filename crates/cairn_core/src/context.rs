//! Plugin context and lifecycle.
//!
//! A [`PluginContext`] owns the plugins of one host instance and drives them
//! through register, start and stop. Each phase tolerates individual plugin
//! failures: a plugin that fails to register is never started, and a plugin
//! that fails to start is never stopped.

use crate::catalog::{BuiltinPluginLoader, DirectoryPluginLoader, PluginCatalog, PluginLoader};
use crate::error::{CoreError, CoreResult};
use cairn_plugin_api::{Plugin, Service, ServiceRegistry};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

const UNKNOWN_VERSION: &str = "<Unknown Version>";

/// Lifecycle states of a [`PluginContext`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifecycle {
    /// Nothing has happened yet.
    Uninitialized,
    /// Plugins are registering.
    Registering,
    /// Registration finished.
    Registered,
    /// Plugins are starting.
    BeforeMainLoopStarted,
    /// Plugins started; the host's main work runs in this state.
    BeforeMainLoopFinished,
    /// Plugins are stopping.
    Stopping,
    /// Every plugin has been stopped.
    Stopped,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Registering => "REGISTERING",
            Self::Registered => "REGISTERED",
            Self::BeforeMainLoopStarted => "BEFORE_MAIN_LOOP_STARTED",
            Self::BeforeMainLoopFinished => "BEFORE_MAIN_LOOP_FINISHED",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Owns the plugins and host services of one host instance.
pub struct PluginContext {
    state: Lifecycle,
    services: ServiceRegistry,
    catalog: PluginCatalog,
    plugins: Vec<Box<dyn Plugin>>,
    plugin_versions: BTreeMap<String, String>,
    summary: Vec<String>,
}

impl PluginContext {
    /// Creates a context that loads plugins from `catalog`.
    #[must_use]
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            state: Lifecycle::Uninitialized,
            services: ServiceRegistry::new(),
            catalog,
            plugins: Vec::new(),
            plugin_versions: BTreeMap::new(),
            summary: Vec::new(),
        }
    }

    /// Registers `service` as the provider of capability `S`.
    pub fn add_service<S: ?Sized + Service>(&self, service: Arc<S>) {
        self.services.add_service(service);
    }

    /// Returns the provider of capability `S`, if any.
    #[must_use]
    pub fn get_service<S: ?Sized + Service>(&self) -> Option<Arc<S>> {
        self.services.get_service()
    }

    /// The service registry handed to plugins.
    #[must_use]
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Lines recorded while registering plugins.
    #[must_use]
    pub fn plugin_summary(&self) -> &[String] {
        &self.summary
    }

    /// Versions of the registered plugins, keyed by name.
    #[must_use]
    pub fn plugin_versions(&self) -> &BTreeMap<String, String> {
        &self.plugin_versions
    }

    /// Names of the plugins still taking part in the lifecycle.
    #[must_use]
    pub fn active_plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    /// Discovers plugins and calls `register` on each of them.
    ///
    /// With a `plugins_dir` that is a directory, only the catalog entries
    /// named by its `*.plugin` descriptors load; otherwise every catalog
    /// entry does.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Lifecycle`] unless the context is
    /// [`Lifecycle::Uninitialized`]. Plugin failures are not errors.
    pub fn register_plugins(&mut self, plugins_dir: Option<&Path>) -> CoreResult<()> {
        if self.state != Lifecycle::Uninitialized {
            return Err(CoreError::lifecycle(
                "plugins have already been registered. Cannot register additional plugins.",
            ));
        }
        self.state = Lifecycle::Registering;

        let dir = plugins_dir.filter(|dir| dir.is_dir());
        let candidates = match dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Searching for plugins in {}", dir.display());
                DirectoryPluginLoader::new(dir).load(&self.catalog)
            }
            None => {
                debug!("No plugins directory, loading built-in plugins");
                BuiltinPluginLoader.load(&self.catalog)
            }
        };

        let total = candidates.len();
        self.summary.push("Plugins:".to_string());
        for mut plugin in candidates {
            let name = plugin.name().to_string();
            match plugin.register(&self.services) {
                Ok(()) => {
                    let version = plugin.version().unwrap_or(UNKNOWN_VERSION).to_string();
                    info!(plugin = %name, "Registered plugin of type {}", plugin.title());
                    self.summary
                        .push(format!("{name} ({}/v{version})", plugin.title()));
                    self.plugin_versions.insert(name, version);
                    self.plugins.push(plugin);
                }
                Err(err) => {
                    error!(
                        plugin = %name,
                        error = %err,
                        "Error registering plugin of type {}, start and stop will not be called.",
                        plugin.title()
                    );
                    self.summary.push(format!("ERROR {name}"));
                }
            }
        }

        self.summary.push(format!(
            "TOTAL = {} of {total} plugins successfully loaded",
            self.plugins.len()
        ));
        if let Some(dir) = dir {
            let absolute = absolute(dir);
            self.summary.push(format!("from {}", absolute.display()));
        }
        debug!(plugins = self.plugins.len(), "Plugin registration complete");

        self.state = Lifecycle::Registered;
        Ok(())
    }

    /// Calls `start` on every registered plugin.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Lifecycle`] unless the context is
    /// [`Lifecycle::Registered`].
    pub fn start_plugins(&mut self) -> CoreResult<()> {
        self.check_state(Lifecycle::Registered)?;
        self.state = Lifecycle::BeforeMainLoopStarted;

        let mut started = Vec::with_capacity(self.plugins.len());
        for mut plugin in self.plugins.drain(..) {
            match plugin.start() {
                Ok(()) => {
                    debug!(plugin = %plugin.name(), "Started plugin");
                    started.push(plugin);
                }
                Err(err) => {
                    error!(
                        plugin = %plugin.name(),
                        error = %err,
                        "Error starting plugin of type {}, stop will not be called.",
                        plugin.title()
                    );
                }
            }
        }
        self.plugins = started;
        debug!("Plugin startup complete");

        self.state = Lifecycle::BeforeMainLoopFinished;
        Ok(())
    }

    /// Calls `stop` on every started plugin.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Lifecycle`] unless the context is
    /// [`Lifecycle::BeforeMainLoopFinished`].
    pub fn stop_plugins(&mut self) -> CoreResult<()> {
        self.check_state(Lifecycle::BeforeMainLoopFinished)?;
        self.state = Lifecycle::Stopping;

        for plugin in &mut self.plugins {
            match plugin.stop() {
                Ok(()) => debug!(plugin = %plugin.name(), "Stopped plugin"),
                Err(err) => error!(
                    plugin = %plugin.name(),
                    error = %err,
                    "Error stopping plugin of type {}",
                    plugin.title()
                ),
            }
        }
        debug!("Plugin shutdown complete");

        self.state = Lifecycle::Stopped;
        Ok(())
    }

    fn check_state(&self, expected: Lifecycle) -> CoreResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CoreError::lifecycle(format!(
                "context should be in state {expected} but it was in {}",
                self.state
            )))
        }
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("state", &self.state)
            .field("plugins", &self.active_plugin_names())
            .finish_non_exhaustive()
    }
}

fn absolute(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_plugin_api::PluginError;
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl Calls {
        fn record(&self, call: String) {
            self.0.lock().push(call);
        }

        fn all(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    struct Scripted {
        name: &'static str,
        fail_register: bool,
        fail_start: bool,
        calls: Arc<Calls>,
    }

    impl Plugin for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> Option<&str> {
            (self.name != "anonymous").then_some("1.0")
        }

        fn register(&mut self, _: &ServiceRegistry) -> Result<(), PluginError> {
            self.calls.record(format!("register {}", self.name));
            if self.fail_register {
                return Err(PluginError::ServiceUnavailable { service: "Scripted" });
            }
            Ok(())
        }

        fn start(&mut self) -> Result<(), PluginError> {
            self.calls.record(format!("start {}", self.name));
            if self.fail_start {
                return Err(PluginError::ServiceUnavailable { service: "Scripted" });
            }
            Ok(())
        }

        fn stop(&mut self) -> Result<(), PluginError> {
            self.calls.record(format!("stop {}", self.name));
            Ok(())
        }
    }

    fn catalog(calls: &Arc<Calls>) -> PluginCatalog {
        let scripted = |name: &'static str, fail_register: bool, fail_start: bool| {
            let calls = Arc::clone(calls);
            move || {
                Box::new(Scripted {
                    name,
                    fail_register,
                    fail_start,
                    calls: Arc::clone(&calls),
                }) as Box<dyn Plugin>
            }
        };
        PluginCatalog::new()
            .with("good", scripted("good", false, false))
            .with("broken", scripted("broken", true, false))
            .with("lazy", scripted("lazy", false, true))
            .with("anonymous", scripted("anonymous", false, false))
    }

    #[test]
    fn full_lifecycle_skips_failed_plugins() {
        let calls = Arc::new(Calls::default());
        let mut context = PluginContext::new(catalog(&calls));
        assert_eq!(context.state(), Lifecycle::Uninitialized);

        context.register_plugins(None).unwrap();
        assert_eq!(context.state(), Lifecycle::Registered);
        assert_eq!(context.active_plugin_names(), vec!["good", "lazy", "anonymous"]);

        context.start_plugins().unwrap();
        assert_eq!(context.state(), Lifecycle::BeforeMainLoopFinished);
        assert_eq!(context.active_plugin_names(), vec!["good", "anonymous"]);

        context.stop_plugins().unwrap();
        assert_eq!(context.state(), Lifecycle::Stopped);

        let calls = calls.all();
        assert!(!calls.contains(&"start broken".to_string()));
        assert!(!calls.contains(&"stop broken".to_string()));
        assert!(!calls.contains(&"stop lazy".to_string()));
        assert!(calls.contains(&"stop good".to_string()));
    }

    #[test]
    fn summary_lines() {
        let calls = Arc::new(Calls::default());
        let mut context = PluginContext::new(catalog(&calls));
        context.register_plugins(None).unwrap();

        assert_eq!(
            context.plugin_summary(),
            &[
                "Plugins:".to_string(),
                "good (good/v1.0)".to_string(),
                "ERROR broken".to_string(),
                "lazy (lazy/v1.0)".to_string(),
                "anonymous (anonymous/v<Unknown Version>)".to_string(),
                "TOTAL = 3 of 4 plugins successfully loaded".to_string(),
            ]
        );
        assert_eq!(context.plugin_versions().get("good").unwrap(), "1.0");
    }

    #[test]
    fn plugins_directory_selects_entries() {
        let calls = Arc::new(Calls::default());
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("good.plugin"), r#"{"name":"good"}"#).unwrap();

        let mut context = PluginContext::new(catalog(&calls));
        context.register_plugins(Some(dir.path())).unwrap();

        assert_eq!(context.active_plugin_names(), vec!["good"]);
        let summary = context.plugin_summary();
        assert_eq!(summary[2], "TOTAL = 1 of 1 plugins successfully loaded");
        assert!(summary[3].starts_with("from "));
    }

    #[test]
    fn missing_directory_loads_everything() {
        let calls = Arc::new(Calls::default());
        let dir = tempdir().unwrap();
        let mut context = PluginContext::new(catalog(&calls));
        context
            .register_plugins(Some(&dir.path().join("absent")))
            .unwrap();
        assert_eq!(context.active_plugin_names().len(), 3);
    }

    #[test]
    fn register_twice_is_rejected() {
        let calls = Arc::new(Calls::default());
        let mut context = PluginContext::new(catalog(&calls));
        context.register_plugins(None).unwrap();

        let err = context.register_plugins(None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "plugins have already been registered. Cannot register additional plugins."
        );
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        let calls = Arc::new(Calls::default());
        let mut context = PluginContext::new(catalog(&calls));

        let err = context.start_plugins().unwrap_err();
        assert_eq!(
            err.to_string(),
            "context should be in state REGISTERED but it was in UNINITIALIZED"
        );

        context.register_plugins(None).unwrap();
        let err = context.stop_plugins().unwrap_err();
        assert_eq!(
            err.to_string(),
            "context should be in state BEFORE_MAIN_LOOP_FINISHED but it was in REGISTERED"
        );
    }

    #[test]
    fn lifecycle_is_ordered() {
        assert!(Lifecycle::Uninitialized < Lifecycle::Registering);
        assert!(Lifecycle::Stopping < Lifecycle::Stopped);
    }
}

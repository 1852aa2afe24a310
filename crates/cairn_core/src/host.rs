//! The host runner.

use crate::catalog::PluginCatalog;
use crate::cli_options::CliOptionsRegistry;
use crate::config::HostConfiguration;
use crate::context::{Lifecycle, PluginContext};
use crate::error::{CoreError, CoreResult};
use crate::provider::{KeyValueStorageProvider, StorageProvider};
use crate::segments::ALL_SEGMENTS;
use crate::storage_service::StorageServiceImpl;
use cairn_plugin_api::{CliOptions, StorageService};
use clap::{ArgMatches, Command};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Drives plugins and storage for one run.
///
/// ```rust,no_run
/// use cairn_core::{Host, HostConfiguration, PluginCatalog, StorageProvider, MARKET_DATA};
///
/// let config = HostConfiguration::new().data_path("./cairn-data");
/// let mut host = Host::new(PluginCatalog::builtin());
/// host.register_plugins(Some(&config.resolved_plugins_dir()))?;
/// host.start(&config)?;
///
/// let storage = host.provider()?.storage_by_segment(&MARKET_DATA)?;
/// # let _ = storage;
/// host.shutdown()?;
/// # Ok::<(), cairn_core::CoreError>(())
/// ```
pub struct Host {
    context: PluginContext,
    storage_service: Arc<StorageServiceImpl>,
    cli_options: Arc<CliOptionsRegistry>,
    provider: Option<Arc<KeyValueStorageProvider>>,
}

impl Host {
    /// Creates a host loading plugins from `catalog`.
    #[must_use]
    pub fn new(catalog: PluginCatalog) -> Self {
        let context = PluginContext::new(catalog);
        let storage_service = Arc::new(StorageServiceImpl::new());
        let cli_options = Arc::new(CliOptionsRegistry::new());
        context.add_service::<dyn StorageService>(Arc::clone(&storage_service) as _);
        context.add_service::<dyn CliOptions>(Arc::clone(&cli_options) as _);
        Self {
            context,
            storage_service,
            cli_options,
            provider: None,
        }
    }

    /// The plugin context.
    #[must_use]
    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// The storage factory registry.
    #[must_use]
    pub fn storage_service(&self) -> &Arc<StorageServiceImpl> {
        &self.storage_service
    }

    /// Discovers and registers plugins.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Lifecycle`] if plugins were already registered.
    pub fn register_plugins(&mut self, plugins_dir: Option<&Path>) -> CoreResult<()> {
        self.context.register_plugins(plugins_dir)?;
        for line in self.context.plugin_summary() {
            info!("{line}");
        }
        Ok(())
    }

    /// Adds the registered plugin options to `command`.
    #[must_use]
    pub fn augment(&self, command: Command) -> Command {
        self.cli_options.augment(command)
    }

    /// Hands parsed options to the plugins.
    ///
    /// # Errors
    ///
    /// Returns the first error a plugin reports.
    pub fn apply_options(&self, matches: &ArgMatches) -> CoreResult<()> {
        self.cli_options.apply(matches)?;
        Ok(())
    }

    /// Resolves the storage factory, builds the provider and starts the
    /// plugins.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if no factory is registered
    /// under the configured name, or [`CoreError::Lifecycle`] if plugins are
    /// not registered.
    pub fn start(&mut self, configuration: &HostConfiguration) -> CoreResult<()> {
        let factory = self
            .storage_service
            .get_by_name(&configuration.storage_factory)
            .ok_or_else(|| {
                CoreError::configuration(format!(
                    "no storage factory named {}",
                    configuration.storage_factory
                ))
            })?;
        debug!(factory = %configuration.storage_factory, "Using storage factory");

        let provider = KeyValueStorageProvider::builder()
            .factory(factory)
            .configuration(configuration.common_configuration())
            .segments(ALL_SEGMENTS)
            .build()?;

        self.context.start_plugins()?;
        self.provider = Some(Arc::new(provider));
        Ok(())
    }

    /// The storage provider.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Lifecycle`] before [`Host::start`] or after
    /// [`Host::shutdown`].
    pub fn provider(&self) -> CoreResult<Arc<KeyValueStorageProvider>> {
        self.provider
            .clone()
            .ok_or_else(|| CoreError::lifecycle("storage provider is not available"))
    }

    /// Stops the plugins, then closes every storage.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Lifecycle`] if the host was not started.
    pub fn shutdown(&mut self) -> CoreResult<()> {
        if self.context.state() != Lifecycle::BeforeMainLoopFinished {
            return Err(CoreError::lifecycle(format!(
                "context should be in state {} but it was in {}",
                Lifecycle::BeforeMainLoopFinished,
                self.context.state()
            )));
        }
        self.context.stop_plugins()?;
        if let Some(provider) = self.provider.take() {
            provider.close()?;
        }
        info!("Host shut down");
        Ok(())
    }
}

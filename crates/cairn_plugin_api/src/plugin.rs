//! The plugin contract.

use crate::error::PluginError;
use crate::services::ServiceRegistry;

/// An extension loaded by the host at startup.
///
/// The host calls [`Plugin::register`] on every discovered plugin, then
/// [`Plugin::start`] on those that registered, then [`Plugin::stop`] on those
/// that started. A failure in one plugin never affects the others.
pub trait Plugin: Send {
    /// Short, stable plugin name.
    fn name(&self) -> &str;

    /// Human-readable title shown in the plugin summary.
    fn title(&self) -> &str {
        self.name()
    }

    /// Plugin version, if known.
    fn version(&self) -> Option<&str> {
        None
    }

    /// Registers the plugin's services and options.
    ///
    /// # Errors
    ///
    /// An error disables the plugin: it is neither started nor stopped.
    fn register(&mut self, services: &ServiceRegistry) -> Result<(), PluginError>;

    /// Called once the host has finished wiring, before the main work starts.
    ///
    /// # Errors
    ///
    /// An error disables the plugin: it will not be stopped.
    fn start(&mut self) -> Result<(), PluginError>;

    /// Called at shutdown.
    ///
    /// # Errors
    ///
    /// Errors are logged by the host and otherwise ignored.
    fn stop(&mut self) -> Result<(), PluginError>;
}

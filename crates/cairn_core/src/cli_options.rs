//! Registration of plugin command-line options.

use cairn_plugin_api::{CliOptionGroup, CliOptions, PluginError};
use clap::{ArgMatches, Command};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::error;

const HELP_HEADING: &str = "Plugin options";

struct Registered {
    namespace: String,
    options: Arc<dyn CliOptionGroup>,
}

/// The host's [`CliOptions`] service.
///
/// Groups are validated on registration, merged into the host command with
/// [`CliOptionsRegistry::augment`] and handed their values with
/// [`CliOptionsRegistry::apply`].
#[derive(Default)]
pub struct CliOptionsRegistry {
    groups: RwLock<Vec<Registered>>,
}

impl CliOptionsRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespaces registered so far, in order.
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        self.groups
            .read()
            .iter()
            .map(|group| group.namespace.clone())
            .collect()
    }

    /// Adds every registered option to `command` as a global argument.
    #[must_use]
    pub fn augment(&self, command: Command) -> Command {
        self.groups.read().iter().fold(command, |command, group| {
            command.args(
                group
                    .options
                    .args()
                    .into_iter()
                    .map(|arg| arg.global(true).help_heading(HELP_HEADING)),
            )
        })
    }

    /// Hands the parsed command line to every registered group.
    ///
    /// # Errors
    ///
    /// Returns the first error a group reports.
    pub fn apply(&self, matches: &ArgMatches) -> Result<(), PluginError> {
        for group in self.groups.read().iter() {
            group.options.apply(matches)?;
        }
        Ok(())
    }
}

impl CliOptions for CliOptionsRegistry {
    fn add_cli_options(
        &self,
        namespace: &str,
        options: Arc<dyn CliOptionGroup>,
    ) -> Result<(), PluginError> {
        let prefixes = [format!("plugin-{namespace}-"), format!("Xplugin-{namespace}-")];
        let bad_names: Vec<String> = options
            .args()
            .iter()
            .filter_map(|arg| {
                let long = arg.get_long().unwrap_or_else(|| arg.get_id().as_str());
                (!prefixes.iter().any(|prefix| long.starts_with(prefix.as_str())))
                    .then(|| format!("--{long}"))
            })
            .collect();

        if !bad_names.is_empty() {
            for name in &bad_names {
                error!(
                    "Plugin option {} did not have the expected prefix of --{}",
                    name, prefixes[0]
                );
            }
            return Err(PluginError::InvalidCliOption {
                namespace: namespace.to_string(),
                names: bad_names,
            });
        }

        self.groups.write().push(Registered {
            namespace: namespace.to_string(),
            options,
        });
        Ok(())
    }
}

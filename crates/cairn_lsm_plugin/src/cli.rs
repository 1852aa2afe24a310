//! Command-line options of the storage plugin.

use crate::config::LsmFactoryConfiguration;
use cairn_plugin_api::{CliOptionGroup, PluginError};
use clap::{value_parser, Arg, ArgAction, ArgMatches};
use parking_lot::RwLock;
use std::sync::Arc;

/// Namespace the options are registered under.
pub const NAMESPACE: &str = "lsm";

/// Long name of the max-open-files option.
pub const MAX_OPEN_FILES_FLAG: &str = "Xplugin-lsm-max-open-files";
/// Long name of the cache capacity option.
pub const CACHE_CAPACITY_FLAG: &str = "Xplugin-lsm-cache-capacity";
/// Long name of the background thread count option.
pub const BACKGROUND_THREAD_COUNT_FLAG: &str = "Xplugin-lsm-background-thread-count";
/// Long name of the high-spec flag.
pub const IS_HIGH_SPEC_FLAG: &str = "Xplugin-lsm-high-spec-enabled";

// Textual forms of the numeric defaults in `config`.
const DEFAULT_MAX_OPEN_FILES_TEXT: &str = "1024";
const DEFAULT_CACHE_CAPACITY_TEXT: &str = "134217728";
const DEFAULT_BACKGROUND_THREAD_COUNT_TEXT: &str = "4";

/// Option group writing into a shared [`LsmFactoryConfiguration`].
#[derive(Debug, Default)]
pub struct LsmCliOptions {
    configuration: Arc<RwLock<LsmFactoryConfiguration>>,
}

impl LsmCliOptions {
    /// Creates the group with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration the parsed values are written to.
    #[must_use]
    pub fn configuration(&self) -> Arc<RwLock<LsmFactoryConfiguration>> {
        Arc::clone(&self.configuration)
    }
}

impl CliOptionGroup for LsmCliOptions {
    fn args(&self) -> Vec<Arg> {
        vec![
            Arg::new(MAX_OPEN_FILES_FLAG)
                .long(MAX_OPEN_FILES_FLAG)
                .value_name("INTEGER")
                .value_parser(value_parser!(i32))
                .default_value(DEFAULT_MAX_OPEN_FILES_TEXT)
                .hide(true)
                .help("Max number of files the engine will open"),
            Arg::new(CACHE_CAPACITY_FLAG)
                .long(CACHE_CAPACITY_FLAG)
                .value_name("LONG")
                .value_parser(value_parser!(u64))
                .default_value(DEFAULT_CACHE_CAPACITY_TEXT)
                .hide(true)
                .help("Cache capacity of each segment in bytes"),
            Arg::new(BACKGROUND_THREAD_COUNT_FLAG)
                .long(BACKGROUND_THREAD_COUNT_FLAG)
                .value_name("INTEGER")
                .value_parser(value_parser!(usize))
                .default_value(DEFAULT_BACKGROUND_THREAD_COUNT_TEXT)
                .hide(true)
                .help("Number of background engine threads"),
            Arg::new(IS_HIGH_SPEC_FLAG)
                .long(IS_HIGH_SPEC_FLAG)
                .action(ArgAction::SetTrue)
                .hide(true)
                .help("Use larger caches on hosts with 16 GiB of RAM or more"),
        ]
    }

    fn apply(&self, matches: &ArgMatches) -> Result<(), PluginError> {
        let mut config = self.configuration.write();
        if let Some(value) = matches.try_get_one::<i32>(MAX_OPEN_FILES_FLAG).ok().flatten() {
            config.max_open_files = *value;
        }
        if let Some(value) = matches.try_get_one::<u64>(CACHE_CAPACITY_FLAG).ok().flatten() {
            config.cache_capacity = *value;
        }
        if let Some(value) = matches
            .try_get_one::<usize>(BACKGROUND_THREAD_COUNT_FLAG)
            .ok()
            .flatten()
        {
            config.background_thread_count = *value;
        }
        if let Some(value) = matches.try_get_one::<bool>(IS_HIGH_SPEC_FLAG).ok().flatten() {
            config.high_spec = *value;
        }
        Ok(())
    }
}

//! # Cairn Core
//!
//! Host services for Cairn.
//!
//! This crate provides:
//! - [`PluginContext`], which drives plugins through register, start and stop
//! - [`PluginCatalog`] and the loaders that select plugins from a plugins
//!   directory
//! - [`StorageServiceImpl`] and [`CliOptionsRegistry`], the services plugins
//!   register with
//! - [`KeyValueStorageProvider`], which caches storage per segment list
//! - [`Host`], which composes all of the above for one run
//!
//! The host's segment set lives in [`segments`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod cli_options;
mod config;
mod context;
mod error;
mod host;
mod provider;
pub mod segments;
mod storage_service;

pub use catalog::{
    BuiltinPluginLoader, DirectoryPluginLoader, PluginCatalog, PluginDescriptor, PluginLoader,
    DESCRIPTOR_EXTENSION,
};
pub use cli_options::CliOptionsRegistry;
pub use config::{
    default_plugins_dir, HostConfiguration, DEFAULT_DATA_PATH, DEFAULT_STORAGE_FACTORY,
    PLUGINS_DIR, PLUGINS_DIR_ENV,
};
pub use context::{Lifecycle, PluginContext};
pub use error::{CoreError, CoreResult};
pub use host::Host;
pub use provider::{
    KeyValueStorageProvider, KeyValueStorageProviderBuilder, StorageCreator, StorageProvider,
};
pub use segments::{ALL_SEGMENTS, BLOTTER, DEFAULT, MARKET_DATA};
pub use storage_service::StorageServiceImpl;

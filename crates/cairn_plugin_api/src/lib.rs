//! # Cairn Plugin API
//!
//! Types and traits shared between the Cairn host and its plugins.
//!
//! This crate provides:
//! - [`SegmentIdentifier`] and [`DataStorageFormat`]
//! - The segmented storage contract: [`SegmentedKeyValueStorage`],
//!   transactions, snapshots and the single-segment [`KeyValueStorage`]
//! - [`KeyValueStorageFactory`], the entry point storage plugins implement
//! - The [`Plugin`] trait and the capability-keyed [`ServiceRegistry`]
//! - [`ValidatingTransaction`], which every storage wraps its transactions in
//!
//! ## Example
//!
//! ```rust,ignore
//! use cairn_plugin_api::{Plugin, PluginError, ServiceRegistry, StorageService};
//!
//! impl Plugin for MyPlugin {
//!     fn name(&self) -> &str { "my-plugin" }
//!
//!     fn register(&mut self, services: &ServiceRegistry) -> Result<(), PluginError> {
//!         let storage = services
//!             .get_service::<dyn StorageService>()
//!             .ok_or(PluginError::ServiceUnavailable { service: "StorageService" })?;
//!         storage.register_key_value_storage(Arc::new(MyFactory::default()));
//!         Ok(())
//!     }
//!
//!     fn start(&mut self) -> Result<(), PluginError> { Ok(()) }
//!     fn stop(&mut self) -> Result<(), PluginError> { Ok(()) }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod config;
mod error;
mod factory;
mod format;
mod plugin;
mod segment;
mod services;
mod storage;
mod transaction;

pub use adapter::{KeyValueStorageTransactionAdapter, SegmentedKeyValueStorageAdapter};
pub use config::{CommonConfiguration, DataStorageConfiguration, DATABASE_DIR};
pub use error::{PluginError, StorageError, StorageResult};
pub use factory::KeyValueStorageFactory;
pub use format::{DataStorageFormat, ParseFormatError};
pub use plugin::Plugin;
pub use segment::{display_segment, SegmentIdentifier};
pub use services::{CliOptionGroup, CliOptions, Service, ServiceRegistry, StorageService};
pub use storage::{
    bounded_stream, KeyPredicate, KeyStream, KeyValueStorage, KeyValueStream, NearestKeyValue,
    SegmentedKeyValueStorage, SnappableKeyValueStorage, SnappedKeyValueStorage,
};
pub use transaction::{
    KeyValueStorageTransaction, SegmentedKeyValueStorageTransaction, ValidatingTransaction,
};

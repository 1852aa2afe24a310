//! # Cairn LSM Plugin
//!
//! Segmented key-value storage for Cairn, backed by `cairn_engine`.
//!
//! This crate provides:
//! - [`LsmPlugin`], which registers the `lsm` storage factory and the
//!   `--Xplugin-lsm-*` command-line options
//! - [`LsmKeyValueStorageFactory`] and the database metadata handling it
//!   runs before opening the engine
//! - [`LsmColumnarKeyValueStorage`], one column family per segment
//! - [`LsmColumnarSnapshot`], reference-counted point-in-time views of
//!   `COMPACT` storage
//!
//! ## Example
//!
//! ```rust,no_run
//! use cairn_lsm_plugin::{LsmFactoryConfiguration, LsmKeyValueStorageFactory};
//! use cairn_plugin_api::{
//!     CommonConfiguration, DataStorageConfiguration, KeyValueStorageFactory, SegmentIdentifier,
//! };
//! use parking_lot::RwLock;
//! use std::sync::Arc;
//!
//! const TRADES: SegmentIdentifier = SegmentIdentifier::new("TRADES", &[1]);
//!
//! let factory = LsmKeyValueStorageFactory::new(
//!     Arc::new(RwLock::new(LsmFactoryConfiguration::default())),
//!     vec![TRADES],
//!     Vec::new(),
//! );
//! let config = CommonConfiguration::new("./data", DataStorageConfiguration::default());
//! let storage = factory.create(&[TRADES], &config)?;
//!
//! let mut txn = storage.start_transaction()?;
//! txn.put(&TRADES, b"key", b"value")?;
//! txn.commit()?;
//! # Ok::<(), cairn_plugin_api::StorageError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cli;
mod columnar;
mod config;
mod error;
mod factory;
mod format;
mod metadata;
mod plugin;
mod snapshot;
mod transaction;

pub use cli::{
    LsmCliOptions, BACKGROUND_THREAD_COUNT_FLAG, CACHE_CAPACITY_FLAG, IS_HIGH_SPEC_FLAG,
    MAX_OPEN_FILES_FLAG, NAMESPACE,
};
pub use columnar::{LsmColumnarKeyValueStorage, SegmentPlan};
pub use config::{
    LsmConfiguration, LsmFactoryConfiguration, DEFAULT_BACKGROUND_THREAD_COUNT,
    DEFAULT_CACHE_CAPACITY, DEFAULT_IS_HIGH_SPEC, DEFAULT_MAX_OPEN_FILES,
    HIGH_SPEC_CACHE_CAPACITY,
};
pub use factory::{LsmKeyValueStorageFactory, FACTORY_NAME};
pub use format::{BaseVersionedStorageFormat, VersionedStorageFormat};
pub use metadata::{initialize as initialize_metadata, DatabaseMetadata, METADATA_FILENAME};
pub use plugin::{LsmPlugin, PLUGIN_NAME};
pub use snapshot::{LsmColumnarSnapshot, LsmSnapshotTransaction, SnapshotMarker};
pub use transaction::LsmTransaction;

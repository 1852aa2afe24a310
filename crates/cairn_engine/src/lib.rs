//! # Cairn Engine
//!
//! Embedded, column-family oriented key-value engine for Cairn.
//!
//! This crate provides:
//! - Named column families with isolated, ordered key spaces
//! - Multi-version reads with registered snapshots
//! - Atomic write batches and read-your-writes transactions, with
//!   optimistic or pessimistic isolation
//! - Crash recovery from a checksummed journal plus periodic checkpoints
//!
//! ## On-disk layout
//!
//! ```text
//! <path>/
//!   LOCK        exclusive process lock
//!   FAMILIES    column family registry
//!   JOURNAL     committed batches since the last checkpoint
//!   CHECKPOINT  full image at a sequence number
//!   OPTIONS     human-readable dump of the open options
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use cairn_engine::{
//!     ColumnFamilyDescriptor, ColumnFamilyOptions, Engine, EngineOptions, ReadOptions,
//!     WriteOptions,
//! };
//!
//! let families = [ColumnFamilyDescriptor::new("default", ColumnFamilyOptions::default())];
//! let (engine, handles) =
//!     Engine::open("/tmp/cairn".as_ref(), EngineOptions::default(), &families).unwrap();
//! engine.put(&handles[0], b"key", b"value", &WriteOptions::default()).unwrap();
//! let value = engine.get(&handles[0], b"key", &ReadOptions::default()).unwrap();
//! assert_eq!(value.as_deref(), Some(&b"value"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod batch;
mod checkpoint;
mod codec;
mod db;
mod dir;
mod error;
mod family;
mod iterator;
mod journal;
mod locks;
mod options;
mod registry;
mod snapshot;
mod transaction;
mod types;

pub use backend::{FileLog, LogBackend, MemoryLog};
pub use batch::WriteBatch;
pub use db::Engine;
pub use error::{EngineError, EngineResult};
pub use family::{ColumnFamily, ColumnFamilyHandle};
pub use iterator::{DbIterator, IteratorMode, OverlayIterator};
pub use options::{
    ColumnFamilyDescriptor, ColumnFamilyOptions, EngineOptions, ReadOptions, TransactionMode,
    WriteOptions,
};
pub use registry::DEFAULT_FAMILY_NAME;
pub use snapshot::Snapshot;
pub use transaction::{Transaction, TransactionState};
pub use types::{FamilyId, SequenceNumber};

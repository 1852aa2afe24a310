//! Error types for the Cairn engine.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// I/O error. The OS message is preserved verbatim.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An on-disk file is corrupted or invalid.
    #[error("corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// The directory is locked by another engine instance.
    #[error("database locked: another process has exclusive access")]
    Locked,

    /// The database holds column families that were not requested at open.
    #[error("Column families not opened: {}", join_names(.names))]
    ColumnFamiliesNotOpened {
        /// Raw names of the families that exist on disk but were not requested.
        names: Vec<Vec<u8>>,
    },

    /// A column family does not exist.
    #[error("column family not found: {}", String::from_utf8_lossy(.name))]
    ColumnFamilyNotFound {
        /// Raw family name.
        name: Vec<u8>,
    },

    /// A column family with this name already exists.
    #[error("column family already exists: {}", String::from_utf8_lossy(.name))]
    ColumnFamilyExists {
        /// Raw family name.
        name: Vec<u8>,
    },

    /// A write could not proceed without waiting.
    #[error("operation incomplete: write would stall")]
    Incomplete,

    /// Optimistic transaction validation failed.
    #[error("resource busy: key in column family {family_id} was modified after the transaction began")]
    Busy {
        /// Family holding the conflicting key.
        family_id: u32,
    },

    /// Timed out waiting for a key lock.
    #[error("operation timed out: could not lock key in column family {family_id}")]
    TimedOut {
        /// Family holding the contended key.
        family_id: u32,
    },

    /// The transaction has already been committed or rolled back.
    #[error("transaction is no longer active")]
    TransactionClosed,

    /// The engine has been closed.
    #[error("engine is closed")]
    Closed,

    /// An argument was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl EngineError {
    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

fn join_names(names: &[Vec<u8>]) -> String {
    names
        .iter()
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

//! Error types shared by the host and plugins.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by segmented storage, its factories and metadata handling.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage or transaction is in a state that forbids the call.
    #[error("{message}")]
    IllegalState {
        /// What was attempted.
        message: String,
    },

    /// The backend reported a failure.
    #[error("{message}")]
    Backend {
        /// Backend error text, OS message included.
        message: String,
    },

    /// The backend ran out of disk space.
    ///
    /// Hosts treat this as fatal; see the `cairn` binary for the exit policy.
    #[error("disk full: {message}")]
    DiskFull {
        /// Backend error text.
        message: String,
    },

    /// The database holds segments the storage was not opened with.
    #[error("Unhandled column families: [{segments}]")]
    UnhandledColumnFamilies {
        /// Display names of the unhandled segments, comma separated.
        segments: String,
    },

    /// A caller asked for segments outside the configured set.
    #[error("Attempted to create storage for segments that are not configured: {segments}")]
    SegmentsNotConfigured {
        /// Names of the offending segments, comma separated.
        segments: String,
    },

    /// Data exists on disk without a metadata file.
    #[error(
        "Database exists but metadata file not found, without it there is no safe way to open the database"
    )]
    MetadataNotFound,

    /// The metadata file could not be read or written.
    #[error(
        "Failed to retrieve the database metadata: {message} could not be found. You may not have the appropriate permission to access the item."
    )]
    MetadataUnreadable {
        /// Underlying failure.
        message: String,
    },

    /// The database was created with another format.
    #[error(
        "Database format mismatch: DB at {} is {existing} but config expects {expected}. Please check your config.",
        .path.display()
    )]
    FormatMismatch {
        /// Data directory.
        path: PathBuf,
        /// Format recorded in the metadata.
        existing: String,
        /// Format requested by configuration.
        expected: String,
    },

    /// The database was written by a newer runtime and cannot be opened.
    #[error(
        "Database unsafe downgrade detect: DB at {} is {format} with version {existing_version} but version {runtime_version} is expected. Please check your config and review release notes for supported downgrade procedures.",
        .path.display()
    )]
    UnsafeDowngrade {
        /// Data directory.
        path: PathBuf,
        /// Format recorded in the metadata.
        format: String,
        /// Version recorded in the metadata.
        existing_version: u32,
        /// Version this runtime writes.
        runtime_version: u32,
    },

    /// The recorded format and version pair is not supported.
    #[error("Unsupported database metadata: {metadata}")]
    UnsupportedMetadata {
        /// Rendered metadata.
        metadata: String,
    },

    /// The operation is not available on this storage.
    #[error("{operation} is not supported")]
    Unsupported {
        /// Name of the operation.
        operation: &'static str,
    },

    /// I/O error outside the backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a metadata read/write error.
    pub fn metadata_unreadable(message: impl Into<String>) -> Self {
        Self::MetadataUnreadable {
            message: message.into(),
        }
    }

    /// Returns `true` for [`StorageError::DiskFull`].
    #[must_use]
    pub fn is_disk_full(&self) -> bool {
        matches!(self, Self::DiskFull { .. })
    }
}

/// Errors raised by plugins and host services.
#[derive(Debug, Error)]
pub enum PluginError {
    /// CLI options did not follow the namespace convention.
    #[error("Error loading CLI options for plugin '{namespace}': bad option names {}", .names.join(", "))]
    InvalidCliOption {
        /// Namespace the plugin registered under.
        namespace: String,
        /// Offending option names.
        names: Vec<String>,
    },

    /// A service the plugin needs is not registered.
    #[error("service not available: {service}")]
    ServiceUnavailable {
        /// Name of the missing capability.
        service: &'static str,
    },

    /// A plugin option value was rejected.
    #[error("invalid value for {option}: {message}")]
    InvalidOptionValue {
        /// Option long name.
        option: String,
        /// Why it was rejected.
        message: String,
    },

    /// Storage failure surfaced through a plugin.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Any other plugin failure.
    #[error("{message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl PluginError {
    /// Creates a generic plugin failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

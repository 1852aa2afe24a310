//! Error types for the Cairn host.

use cairn_plugin_api::{PluginError, StorageError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for host operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the host.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Plugin error.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A lifecycle method was called in the wrong state.
    #[error("{message}")]
    Lifecycle {
        /// What went wrong.
        message: String,
    },

    /// The host configuration cannot be satisfied.
    #[error("configuration error: {message}")]
    Configuration {
        /// What is missing or wrong.
        message: String,
    },

    /// A plugin descriptor file could not be parsed.
    #[error("invalid plugin descriptor {}: {message}", .path.display())]
    Descriptor {
        /// Descriptor path.
        path: PathBuf,
        /// Parse failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a lifecycle error.
    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the underlying cause is a full disk.
    #[must_use]
    pub fn is_disk_full(&self) -> bool {
        match self {
            Self::Storage(err) => err.is_disk_full(),
            Self::Plugin(PluginError::Storage(err)) => err.is_disk_full(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_full_is_detected_through_plugin_errors() {
        let full = StorageError::DiskFull {
            message: "No space left on device".into(),
        };
        assert!(CoreError::from(PluginError::from(full)).is_disk_full());
        assert!(!CoreError::configuration("x").is_disk_full());
    }

    #[test]
    fn storage_errors_keep_their_message() {
        let err = CoreError::from(StorageError::illegal_state("Storage has been closed"));
        assert_eq!(err.to_string(), "Storage has been closed");
    }
}

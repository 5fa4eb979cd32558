//! Error types for artifact storage.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage error types.
#[derive(Debug, Error)]
pub enum Error {
    /// A filesystem operation failed.
    #[error("storage operation '{operation}' on '{path}' failed: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive could not be produced.
    #[error("failed to archive '{dir}': {reason}")]
    ArchiveFailed { dir: PathBuf, reason: String },

    /// The artifact does not describe a location inside the storage root.
    #[error("invalid artifact path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

impl Error {
    /// Create an i/o error for the named operation.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Create an archive error.
    pub fn archive_failed(dir: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArchiveFailed {
            dir: dir.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

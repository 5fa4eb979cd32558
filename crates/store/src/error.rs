//! Error types for the store crate.

use std::path::PathBuf;

use hsc_core::ObjectKey;
use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Store error types.
#[derive(Debug, Error)]
pub enum Error {
    /// No object is stored under the key.
    #[error("{kind} '{key}' not found")]
    NotFound { kind: String, key: ObjectKey },

    /// `create` on a key that is already taken.
    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: String, key: ObjectKey },

    /// `update` with a stale resource version.
    #[error("{kind} '{key}' was modified concurrently: expected version {expected}, found {actual}")]
    Conflict {
        kind: String,
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    /// The key cannot name a stored object.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Reading or writing the backing files failed.
    #[error("store i/o on '{path}' failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An object could not be (de)serialized.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The backend rejected the operation for another reason.
    #[error("store operation '{operation}' failed: {reason}")]
    StoreFailed { operation: String, reason: String },
}

impl Error {
    /// Create a not found error.
    pub fn not_found(kind: &str, key: ObjectKey) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            key,
        }
    }

    /// Create an already exists error.
    pub fn already_exists(kind: &str, key: ObjectKey) -> Self {
        Self::AlreadyExists {
            kind: kind.to_string(),
            key,
        }
    }

    /// Create a conflict error.
    pub fn conflict(kind: &str, key: ObjectKey, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            kind: kind.to_string(),
            key,
            expected,
            actual,
        }
    }

    /// Create an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an i/o error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// Create a store failed error.
    pub fn store_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoreFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a re-read and retry can resolve the error.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::AlreadyExists { .. })
    }
}

impl From<hsc_core::Error> for Error {
    fn from(err: hsc_core::Error) -> Self {
        match err {
            hsc_core::Error::InvalidKey { input, reason } => Self::invalid_key(input, reason),
            other => Self::store_failed("validate", other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

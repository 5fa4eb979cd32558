//! Error types for the fetcher crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching a payload.
///
/// Variants split into two classes: transport failures (the payload never
/// arrived intact) and extraction failures (it arrived but could not be
/// written or unpacked). See [`Error::is_extraction`].
#[derive(Error, Debug)]
pub enum Error {
    /// The request could not be built from the URL.
    #[error("failed to generate request for url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Network, DNS, TLS or timeout failure.
    #[error("failed to fetch data from '{url}': {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered outside the 2xx range.
    #[error("failed to fetch url content with status code {status}")]
    UnexpectedStatus { status: u16 },

    /// The body exceeded the configured download limit.
    #[error("payload exceeds the download limit of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// The caller cancelled the fetch.
    #[error("fetch of '{url}' was cancelled")]
    Cancelled { url: String },

    /// Credentials were supplied in an unusable combination.
    #[error("invalid credentials: {reason}")]
    InvalidCredentials { reason: String },

    /// Client construction failed.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// Writing the payload to the working directory failed.
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The payload looked like an archive but could not be unpacked.
    #[error("failed to untar file content from '{path}': {reason}")]
    Extract { path: PathBuf, reason: String },
}

impl Error {
    /// Create an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Create an invalid credentials error.
    pub fn invalid_credentials(reason: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            reason: reason.into(),
        }
    }

    /// Create a config error.
    pub fn config_error(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    /// Create a write error.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Create an extraction error.
    pub fn extract(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Extract {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the payload arrived but could not be written or unpacked.
    pub const fn is_extraction(&self) -> bool {
        matches!(self, Self::Write { .. } | Self::Extract { .. })
    }

    /// Status code for `UnexpectedStatus` errors.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_includes_code() {
        let err = Error::UnexpectedStatus { status: 503 };
        assert!(err.to_string().contains("503"));
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_extraction());
    }

    #[test]
    fn test_extraction_class() {
        let err = Error::extract("/tmp/x.tar.gz", "bad header");
        assert!(err.is_extraction());
        let err = Error::write("/tmp/x", std::io::Error::other("disk full"));
        assert!(err.is_extraction());
        assert!(!Error::cancelled("http://x").is_extraction());
    }
}

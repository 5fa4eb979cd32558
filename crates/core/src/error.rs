//! Core error types for resource handling.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use thiserror::Error;

/// Core error type for resource operations.
#[derive(Debug, Error)]
pub enum Error {
    // Identity errors
    #[error("invalid object key '{input}': {reason}")]
    InvalidKey { input: String, reason: String },

    #[error("invalid {kind} '{name}': {reason}")]
    InvalidResource {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("YAML parse error: {reason}")]
    YamlParseFailed { reason: String },
}

impl Error {
    /// Create an invalid key error.
    pub fn invalid_key(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid resource error.
    pub fn invalid_resource(
        kind: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidResource {
            kind: kind.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a YAML parse error.
    pub fn yaml_parse_failed(reason: impl Into<String>) -> Self {
        Self::YamlParseFailed {
            reason: reason.into(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::yaml_parse_failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_key_display() {
        let err = Error::invalid_key("a/b/c", "too many separators");
        assert!(err.to_string().contains("a/b/c"));
        assert!(err.to_string().contains("too many separators"));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let parsed: std::result::Result<serde_yaml::Value, _> = serde_yaml::from_str("a: [b");
        let err = parsed.map_err(Error::from).err();
        assert!(matches!(err, Some(Error::YamlParseFailed { .. })));
    }
}

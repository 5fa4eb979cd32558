//! Result type definition and extension traits for Railway-Oriented Programming.
//!
//! Provides combinators for best-effort operations whose failure must be
//! logged but never propagated.

use std::fmt::Display;

use crate::error::Error;

/// The standard Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for results produced by best-effort side effects.
pub trait ResultExt<T> {
    /// Convert to an Option, logging the error at `warn` with the given context.
    fn warn_on_err(self, context: &str) -> Option<T>;
}

impl<T, E: Display> ResultExt<T> for std::result::Result<T, E> {
    fn warn_on_err(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "{context}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warn_on_err_ok() {
        let result: std::result::Result<i32, &str> = Ok(42);
        assert_eq!(result.warn_on_err("ignored"), Some(42));
    }

    #[test]
    fn test_warn_on_err_err() {
        let result: std::result::Result<i32, &str> = Err("boom");
        assert_eq!(result.warn_on_err("cleanup failed"), None);
    }
}

//! Credentials attached to a fetch request.

use std::fmt;

use tracing::warn;

use crate::error::{Error, Result};

/// Authentication applied to the GET request.
///
/// Construct through [`FetchCredentials::from_parts`] when the values come
/// from loose configuration, so the combination is validated once.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum FetchCredentials {
    /// Anonymous request.
    #[default]
    None,
    /// `Authorization: Basic ...`
    Basic { username: String, password: String },
    /// `Authorization: Bearer <token>`
    Bearer { token: String },
}

impl FetchCredentials {
    /// Build credentials from optional username, password and token.
    ///
    /// Basic auth needs both a username and a password. When basic auth and a
    /// token are both present, basic auth wins and the token is ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCredentials` when only one of username and
    /// password is supplied.
    pub fn from_parts(
        username: Option<String>,
        password: Option<String>,
        token: Option<String>,
    ) -> Result<Self> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());

        match (non_empty(username), non_empty(password), non_empty(token)) {
            (Some(username), Some(password), token) => {
                if token.is_some() {
                    warn!("both basic auth and bearer token configured, using basic auth");
                }
                Ok(Self::Basic { username, password })
            }
            (Some(_), None, _) => Err(Error::invalid_credentials(
                "username supplied without password",
            )),
            (None, Some(_), _) => Err(Error::invalid_credentials(
                "password supplied without username",
            )),
            (None, None, Some(token)) => Ok(Self::Bearer { token }),
            (None, None, None) => Ok(Self::None),
        }
    }

    /// Apply the credentials to a request.
    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::None => request,
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
            Self::Bearer { token } => request.bearer_auth(token),
        }
    }
}

impl fmt::Debug for FetchCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_nothing_supplied() {
        let creds = FetchCredentials::from_parts(None, None, None).unwrap();
        assert_eq!(creds, FetchCredentials::None);
    }

    #[test]
    fn test_empty_strings_count_as_absent() {
        let creds = FetchCredentials::from_parts(some(""), some(""), some("")).unwrap();
        assert_eq!(creds, FetchCredentials::None);
    }

    #[test]
    fn test_basic_wins_over_token() {
        let creds = FetchCredentials::from_parts(some("user"), some("pass"), some("tok")).unwrap();
        assert_eq!(
            creds,
            FetchCredentials::Basic {
                username: "user".into(),
                password: "pass".into()
            }
        );
    }

    #[test]
    fn test_token_only() {
        let creds = FetchCredentials::from_parts(None, None, some("tok")).unwrap();
        assert_eq!(creds, FetchCredentials::Bearer { token: "tok".into() });
    }

    #[test]
    fn test_half_basic_is_rejected() {
        assert!(FetchCredentials::from_parts(some("user"), None, None).is_err());
        assert!(FetchCredentials::from_parts(None, some("pass"), some("tok")).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = FetchCredentials::from_parts(some("user"), some("hunter2"), None).unwrap();
        let debug = format!("{creds:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}

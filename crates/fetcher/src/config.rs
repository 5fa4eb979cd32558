//! Configuration for the fetcher.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP client settings used by [`crate::Fetcher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Timeout for the whole request, body included.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,

    /// Timeout for establishing the connection.
    #[serde(with = "duration_secs", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum accepted body size in bytes. `None` means unlimited.
    #[serde(default)]
    pub max_download_bytes: Option<u64>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            max_download_bytes: None,
        }
    }
}

impl FetcherConfig {
    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the download limit.
    #[must_use]
    pub const fn max_download_bytes(mut self, limit: u64) -> Self {
        self.max_download_bytes = Some(limit);
        self
    }
}

const fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    format!("hsc-fetcher/{}", env!("CARGO_PKG_VERSION"))
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.max_download_bytes.is_none());
        assert!(config.user_agent.starts_with("hsc-fetcher/"));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: FetcherConfig = toml::from_str("timeout = 5\nmax_download_bytes = 1024\n").unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_download_bytes, Some(1024));
    }
}

//! Controller configuration.
//!
//! Read from a TOML file, then overridden by `HSC_*` environment variables.
//! Fetch credentials are never read from the file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hsc_fetcher::{FetchCredentials, FetcherConfig};
use hsc_reconciler::ReconcilerConfig;
use hsc_storage::DEFAULT_RETENTION_RECORDS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatcher::{BackoffConfig, DispatchConfig};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "HSC_";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("invalid fetch credentials: {0}")]
    Credentials(#[from] hsc_fetcher::Error),
}

/// Top-level configuration of the controller binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Directory holding declarations, artifact records and archives.
    pub data_dir: PathBuf,
    /// Host (and port) written into artifact URLs.
    pub hostname: String,
    /// Address the artifact file server binds to.
    pub listen_addr: SocketAddr,
    /// Archives kept per source, current one included.
    pub retention_records: usize,
    /// Resync loop settings.
    pub dispatch: DispatchConfig,
    /// HTTP client settings.
    pub fetcher: FetcherConfig,
    /// Reconciliation settings.
    pub reconciler: ReconcilerConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".hsc"),
            hostname: "localhost:9090".to_string(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9090)),
            retention_records: DEFAULT_RETENTION_RECORDS,
            dispatch: DispatchConfig::default(),
            fetcher: FetcherConfig::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Load the file at `path` (if any) and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the file cannot be read or parsed, an
    /// override has an invalid value, or the result fails [`Self::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read`, `ConfigError::Parse` or
    /// `ConfigError::Invalid`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the controller cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, reason: &str| ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        self.dispatch
            .validate()
            .map_err(|(field, reason)| invalid(field, &reason))?;
        if self.retention_records == 0 {
            return Err(invalid("retention_records", "must be at least 1"));
        }
        if self.hostname.is_empty() {
            return Err(invalid("hostname", "must not be empty"));
        }
        Ok(())
    }

    /// Apply `HSC_*` overrides looked up through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnv` for values that do not parse.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            let var = format!("{ENV_PREFIX}{name}");
            lookup(&var).filter(|v| !v.is_empty()).map(|v| (var, v))
        };

        if let Some((_, value)) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }
        if let Some((_, value)) = var("HOSTNAME") {
            self.hostname = value;
        }
        if let Some((name, value)) = var("LISTEN_ADDR") {
            self.listen_addr = parse_env(&name, &value)?;
        }
        if let Some((name, value)) = var("RETENTION_RECORDS") {
            self.retention_records = parse_env(&name, &value)?;
        }
        if let Some((name, value)) = var("MAX_CONCURRENT_RECONCILES") {
            self.dispatch.max_concurrent_reconciles = parse_env(&name, &value)?;
        }
        if let Some((name, value)) = var("RESYNC_INTERVAL") {
            self.reconciler.resync_interval = Duration::from_secs(parse_env(&name, &value)?);
        }
        if let Some((name, value)) = var("FETCH_TIMEOUT") {
            self.fetcher.timeout = Duration::from_secs(parse_env(&name, &value)?);
        }
        if let Some((_, value)) = var("WORK_DIR") {
            self.reconciler.work_root = Some(PathBuf::from(value));
        }
        Ok(self)
    }

    /// Set the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the hostname used in artifact URLs.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the dispatch backoff.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.dispatch.backoff = backoff;
        self
    }

    /// Directory of the JSON object store.
    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }

    /// Root directory of stored archives, served over HTTP.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }
}

fn parse_env<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Fetch credentials from `HSC_FETCH_USERNAME`, `HSC_FETCH_PASSWORD` and
/// `HSC_FETCH_TOKEN`.
///
/// # Errors
///
/// Returns `ConfigError::Credentials` when only half of basic auth is set.
pub fn credentials_from_env<F>(lookup: F) -> Result<FetchCredentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
    Ok(FetchCredentials::from_parts(
        var("FETCH_USERNAME"),
        var("FETCH_PASSWORD"),
        var("FETCH_TOKEN"),
    )?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use hsc_reconciler::OwnershipStrategy;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.retention_records, 2);
        assert_eq!(config.objects_dir(), PathBuf::from(".hsc/objects"));
        assert_eq!(config.artifacts_dir(), PathBuf::from(".hsc/artifacts"));
    }

    #[test]
    fn test_toml_sections() {
        let config: ControllerConfig = toml::from_str(
            r#"
            data_dir = "/var/lib/hsc"
            hostname = "artifacts.local"

            [dispatch]
            max_concurrent_reconciles = 8

            [fetcher]
            timeout = 120

            [reconciler]
            resync_interval = 60
            ownership = "owner_scan"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/hsc"));
        assert_eq!(config.hostname, "artifacts.local");
        assert_eq!(config.dispatch.max_concurrent_reconciles, 8);
        assert_eq!(config.fetcher.timeout, Duration::from_secs(120));
        assert_eq!(config.reconciler.resync_interval, Duration::from_secs(60));
        assert_eq!(config.reconciler.ownership, OwnershipStrategy::OwnerScan);
        assert_eq!(config.listen_addr, ControllerConfig::default().listen_addr);
    }

    #[test]
    fn test_env_overrides() {
        let config = ControllerConfig::default()
            .with_env(env(&[
                ("HSC_DATA_DIR", "/data"),
                ("HSC_LISTEN_ADDR", "0.0.0.0:8080"),
                ("HSC_RESYNC_INTERVAL", "30"),
                ("HSC_HOSTNAME", ""),
            ]))
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.listen_addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert_eq!(config.reconciler.resync_interval, Duration::from_secs(30));
        assert_eq!(config.hostname, "localhost:9090");
    }

    #[test]
    fn test_env_invalid_value() {
        let err = ControllerConfig::default()
            .with_env(env(&[("HSC_MAX_CONCURRENT_RECONCILES", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref var, .. } if var == "HSC_MAX_CONCURRENT_RECONCILES"));
    }

    #[test]
    fn test_zero_tick_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hsc.toml");
        std::fs::write(&path, "[dispatch]\ntick = 0\n").unwrap();

        let err = ControllerConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "dispatch.tick"));
        assert!(ControllerConfig::load(Some(path.as_path())).is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(ControllerConfig::default().validate().is_ok());
        let config = ControllerConfig {
            retention_records: 0,
            ..ControllerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_credentials_from_env() {
        let creds = credentials_from_env(env(&[("HSC_FETCH_TOKEN", "secret")])).unwrap();
        assert_eq!(
            creds,
            FetchCredentials::Bearer {
                token: "secret".into()
            }
        );

        let err = credentials_from_env(env(&[("HSC_FETCH_USERNAME", "user")])).unwrap_err();
        assert!(matches!(err, ConfigError::Credentials(_)));
    }
}

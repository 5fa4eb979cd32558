//! The HTTP fetcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::config::FetcherConfig;
use crate::credentials::FetchCredentials;
use crate::digest::HashingWriter;
use crate::error::{Error, Result};
use crate::extract::{download_filename, extract_in_place};

/// Result of one successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Lowercase hex SHA-256 of the raw payload bytes.
    pub digest: String,
    /// Where the payload was written before any extraction.
    pub path: PathBuf,
    /// Payload length in bytes.
    pub size: u64,
    /// Whether the payload was an archive and got unpacked.
    pub extracted: bool,
}

/// Retrieves remote payloads into a working directory.
#[derive(Debug, Clone)]
pub struct Fetcher {
    config: Arc<FetcherConfig>,
    http_client: reqwest::Client,
}

impl Fetcher {
    /// Create a fetcher with default configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_config(FetcherConfig::default())
    }

    /// Create a fetcher with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the HTTP client cannot be built.
    pub fn with_config(config: FetcherConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::config_error(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch `url` into `work_dir`, hashing the payload as it streams and
    /// unpacking it when it is an archive.
    ///
    /// Cancelling `cancel` aborts the request at the next await point.
    ///
    /// # Errors
    ///
    /// Transport-class errors when the payload could not be retrieved
    /// (`InvalidUrl`, `Transport`, `UnexpectedStatus`, `PayloadTooLarge`,
    /// `Cancelled`), extraction-class errors when it could not be written
    /// or unpacked (`Write`, `Extract`).
    pub async fn fetch(
        &self,
        cancel: &CancellationToken,
        url: &str,
        work_dir: &Path,
        credentials: &FetchCredentials,
    ) -> Result<FetchOutcome> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(url, "Fetch cancelled");
                Err(Error::cancelled(url))
            }
            outcome = self.fetch_inner(url, work_dir, credentials) => outcome,
        }
    }

    async fn fetch_inner(
        &self,
        url: &str,
        work_dir: &Path,
        credentials: &FetchCredentials,
    ) -> Result<FetchOutcome> {
        let parsed = Url::parse(url).map_err(|e| Error::invalid_url(url, e.to_string()))?;
        let start = Instant::now();
        info!(url, "Fetching payload");

        let request = credentials.apply(self.http_client.get(parsed.clone()));
        let mut response = request
            .send()
            .await
            .map_err(|e| Error::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let limit = self.config.max_download_bytes;
        if let (Some(limit), Some(length)) = (limit, response.content_length()) {
            if length > limit {
                return Err(Error::PayloadTooLarge { limit });
            }
        }

        let path = work_dir.join(download_filename(&parsed));
        let file = File::create(&path)
            .await
            .map_err(|e| Error::write(&path, e))?;
        let mut writer = HashingWriter::new(file);

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::transport(url, e))?
        {
            writer
                .write_chunk(&chunk)
                .await
                .map_err(|e| Error::write(&path, e))?;
            if let Some(limit) = limit {
                if writer.written() > limit {
                    return Err(Error::PayloadTooLarge { limit });
                }
            }
        }

        let size = writer.written();
        let (file, digest) = writer.finish().await.map_err(|e| Error::write(&path, e))?;
        drop(file);

        let archive = path.clone();
        let dest = work_dir.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || extract_in_place(&archive, &dest))
            .await
            .map_err(|e| Error::extract(&path, e.to_string()))??;

        debug!(
            url,
            digest = %digest,
            size,
            extracted,
            duration_ms = start.elapsed().as_millis(),
            "Fetch complete"
        );

        Ok(FetchOutcome {
            digest,
            path,
            size,
            extracted,
        })
    }
}

//! # hsc-fetcher
//!
//! Retrieves a remote payload over HTTP for the source controller.
//!
//! A fetch is a single GET. The body streams through one loop into the
//! working directory and a SHA-256 hasher at the same time; archives
//! (`tar`, `tar.gz`) are unpacked in place afterwards.
//!
//! ## Example
//!
//! ```ignore
//! use hsc_fetcher::{FetchCredentials, Fetcher};
//! use tokio_util::sync::CancellationToken;
//!
//! let fetcher = Fetcher::new()?;
//! let outcome = fetcher
//!     .fetch(&CancellationToken::new(), "https://example.com/site.tar.gz", dir, &FetchCredentials::None)
//!     .await?;
//! println!("revision {}", outcome.digest);
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod config;
pub mod credentials;
pub mod digest;
pub mod error;
pub mod extract;

pub use client::{FetchOutcome, Fetcher};
pub use config::FetcherConfig;
pub use credentials::FetchCredentials;
pub use digest::{HashingWriter, sha256_hex};
pub use error::{Error, Result};
pub use extract::PayloadFormat;

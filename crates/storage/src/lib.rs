//! # hsc-storage
//!
//! Where fetched payloads end up: one deterministic `tar.gz` per revision,
//! laid out under a root directory so a plain file server can expose them.
//!
//! ```text
//! <root>/http/default/site/<revision>.tar.gz
//!   -> http://<hostname>/http/default/site/<revision>.tar.gz
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod archive;
pub mod error;
pub mod storage;

pub use archive::{ArchiveFilter, write_tar_gz};
pub use error::{Error, Result};
pub use storage::{ArtifactCallback, ArtifactStorage, DEFAULT_RETENTION_RECORDS, LocalStorage};

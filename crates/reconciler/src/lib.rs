//! # hsc-reconciler
//!
//! Turns `Http` source declarations into stored artifacts.
//!
//! One reconciliation of a source:
//!
//! 1. Loads the declaration (missing or deleting sources are skipped)
//! 2. Fetches the URL into a fresh workspace; the SHA-256 of the payload is
//!    the revision
//! 3. Archives the workspace into storage and upserts the `Artifact` record
//! 4. Writes the source's status, whatever happened before
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hsc_core::{Artifact, HttpSource, ObjectKey};
//! use hsc_reconciler::HttpSourceReconciler;
//! use hsc_storage::LocalStorage;
//! use hsc_store::InMemoryStore;
//! use tokio_util::sync::CancellationToken;
//!
//! let reconciler = HttpSourceReconciler::builder()
//!     .with_sources(InMemoryStore::<HttpSource>::new_arc())
//!     .with_artifacts(InMemoryStore::<Artifact>::new_arc())
//!     .with_storage(Arc::new(LocalStorage::new("/var/lib/hsc", "localhost:9090")))
//!     .build()?;
//!
//! let outcome = reconciler
//!     .reconcile(&CancellationToken::new(), &ObjectKey::new("default", "site"))
//!     .await?;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod ownership;
pub mod reconciler;
pub mod revision;
pub mod types;
pub mod upsert;
pub mod workspace;

pub use error::{Error, Result};
pub use ownership::{OwnershipResolver, OwnershipStrategy};
pub use reconciler::{HttpSourceReconciler, ReconcilerBuilder, ReconcilerConfig};
pub use revision::{ArtifactFields, RevisionPlan};
pub use types::{OperationResult, ReconcileOutcome};
pub use upsert::upsert_artifact;
pub use workspace::Workspace;

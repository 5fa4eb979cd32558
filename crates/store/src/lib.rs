//! # hsc-store
//!
//! Declarative object storage for the HTTP source controller.
//!
//! Every object has a key (`namespace/name`), a uid assigned on create and a
//! resource version bumped on every write. `update` is conditioned on that
//! version, so two writers racing on the same object see a `Conflict` and
//! re-read. Status lives beside the spec and is written unconditionally
//! through [`StatusStore::patch_status`].
//!
//! Backends:
//! - [`InMemoryStore`]: process-local, used by tests and one-shot runs
//! - [`FsObjectStore`]: JSON files under a root directory
//! - [`TracingStore`]: decorator that logs every operation

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod fs;
mod lifecycle;
pub mod store;

pub use error::{Error, Result};
pub use fs::FsObjectStore;
pub use store::{InMemoryStore, ObjectStore, StatusStore, TracingStore};

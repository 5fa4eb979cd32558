//! # hsc-core
//!
//! Resource model for the HTTP source controller.
//!
//! - [`HttpSource`]: the declaration of one remote payload to mirror
//! - [`Artifact`]: the record of the last archived payload for a source
//! - [`ObjectMeta`] / [`OwnerReference`]: identity, concurrency and ownership
//! - [`Condition`]: typed status observations
//!
//! Naming rules live here too, so every crate derives the same artifact
//! identity from a source.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod artifact;
pub mod condition;
pub mod error;
pub mod meta;
pub mod resource;
pub mod result;
pub mod source;

pub use artifact::{
    ARCHIVE_EXTENSION, ARTIFACT_KIND, Artifact, ArtifactSpec, archive_filename, artifact_key_for,
    artifact_name,
};
pub use condition::{
    Condition, ConditionStatus, find_condition, is_condition_true, reasons, set_condition, types,
};
pub use error::Error;
pub use meta::{
    DEFAULT_NAMESPACE, ObjectKey, ObjectMeta, OwnerReference, validate_name, validate_namespace,
};
pub use resource::{HasStatus, Resource};
pub use result::{Result, ResultExt};
pub use source::{HTTP_SOURCE_KIND, HttpSource, HttpSourceSpec, HttpSourceStatus};

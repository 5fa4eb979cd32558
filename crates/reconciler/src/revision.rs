//! Revision identity and the write plan derived from it.
//!
//! The revision of a payload is its SHA-256 digest, so the same bytes always
//! map to the same archive name and the same artifact record.

use chrono::{DateTime, Utc};
use hsc_core::{Artifact, ArtifactSpec};

/// What the upsert is expected to do for a fetched digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionPlan {
    /// No artifact record yet.
    Create,
    /// The record points at an older revision.
    Update { previous: String },
    /// The record already describes this revision.
    Unchanged,
}

impl RevisionPlan {
    /// Compare a fetched digest with the existing record.
    pub fn resolve(digest: &str, existing: Option<&Artifact>) -> Self {
        match existing {
            None => Self::Create,
            Some(artifact) if artifact.spec.revision == digest => Self::Unchanged,
            Some(artifact) => Self::Update {
                previous: artifact.spec.revision.clone(),
            },
        }
    }

    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// Values the upsert writes into the artifact record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFields {
    pub revision: String,
    pub digest: String,
    pub path: String,
    pub url: String,
    pub size: Option<u64>,
    pub last_update_time: Option<DateTime<Utc>>,
}

impl ArtifactFields {
    /// Fields for a freshly archived artifact.
    ///
    /// An unchanged revision keeps the existing update time, so re-archiving
    /// the same payload leaves the record untouched.
    pub fn from_archived(
        archived: &Artifact,
        plan: &RevisionPlan,
        existing: Option<&Artifact>,
        now: DateTime<Utc>,
    ) -> Self {
        let last_update_time = match (plan, existing) {
            (RevisionPlan::Unchanged, Some(existing)) => {
                existing.spec.last_update_time.or(Some(now))
            }
            _ => Some(now),
        };

        Self {
            revision: archived.spec.revision.clone(),
            digest: archived.spec.digest.clone(),
            path: archived.spec.path.clone(),
            url: archived.spec.url.clone(),
            size: archived.spec.size,
            last_update_time,
        }
    }

    /// Write the fields into a spec.
    pub fn apply(&self, spec: &mut ArtifactSpec) {
        spec.revision.clone_from(&self.revision);
        spec.digest.clone_from(&self.digest);
        spec.path.clone_from(&self.path);
        spec.url.clone_from(&self.url);
        spec.size = self.size;
        spec.last_update_time = self.last_update_time;
    }
}

//! Core types for the reconciler.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the upsert did to the artifact record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Created,
    Updated,
    /// The record already matched; nothing was written.
    Unchanged,
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        };
        write!(f, "{s}")
    }
}

/// Result of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// When to reconcile this source again. `None` means only on change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requeue_after: Option<Duration>,
    /// Revision stored by this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// What happened to the artifact record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationResult>,
}

impl ReconcileOutcome {
    /// Outcome for a source that was missing or being deleted.
    pub const fn skipped() -> Self {
        Self {
            requeue_after: None,
            revision: None,
            operation: None,
        }
    }

    /// Outcome for a stored revision.
    pub const fn stored(revision: String, operation: OperationResult, requeue_after: Duration) -> Self {
        Self {
            requeue_after: Some(requeue_after),
            revision: Some(revision),
            operation: Some(operation),
        }
    }

    /// Whether the run did nothing.
    pub const fn is_skipped(&self) -> bool {
        self.revision.is_none()
    }
}

//! Typed status conditions.
//!
//! Conditions form an ordered set keyed by type. Replacing a condition keeps
//! its transition time unless the status value actually changed, so readers
//! can tell how long a source has been failing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Condition types written by the reconciler.
pub mod types {
    /// The source has a stored artifact for its current spec.
    pub const READY: &str = "Ready";
}

/// Machine-readable reasons attached to conditions.
pub mod reasons {
    pub const SUCCEEDED: &str = "Succeeded";
    pub const PROGRESSING: &str = "Progressing";
    pub const FETCH_FAILED: &str = "FetchFailed";
    pub const EXTRACT_FAILED: &str = "ExtractFailed";
    pub const WORKSPACE_FAILED: &str = "WorkspaceFailed";
    pub const ARTIFACT_LOOKUP_FAILED: &str = "ArtifactLookupFailed";
    pub const STORAGE_OPERATION_FAILED: &str = "StorageOperationFailed";
    pub const ARTIFACT_UPSERT_FAILED: &str = "ArtifactUpsertFailed";
    pub const LOAD_FAILED: &str = "LoadFailed";
    pub const STATUS_PERSIST_FAILED: &str = "StatusPersistFailed";
}

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One observation about a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
    #[serde(default)]
    pub observed_generation: i64,
}

impl Condition {
    /// Create a condition stamped with the current time.
    pub fn new(
        r#type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            r#type: r#type.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
            observed_generation: 0,
        }
    }

    /// Set the generation this condition was computed for.
    #[must_use]
    pub const fn with_generation(mut self, generation: i64) -> Self {
        self.observed_generation = generation;
        self
    }
}

/// Insert or replace the condition with the same type.
///
/// The previous transition time survives when the status value is unchanged.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
        }
        None => conditions.push(condition),
    }
}

/// Find a condition by type.
pub fn find_condition<'a>(conditions: &'a [Condition], r#type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == r#type)
}

/// Whether the condition of the given type exists with status `True`.
pub fn is_condition_true(conditions: &[Condition], r#type: &str) -> bool {
    find_condition(conditions, r#type).is_some_and(|c| c.status == ConditionStatus::True)
}

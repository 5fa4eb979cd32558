//! Error types for the reconciler crate.

use hsc_core::{ObjectKey, reasons};
use hsc_store::Error as StoreError;
use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
///
/// A missing or deleting source is not an error; those reconciliations end
/// in `Ok`.
#[derive(Debug, Error)]
pub enum Error {
    /// The payload could not be retrieved.
    #[error("failed to fetch content: {0}")]
    Transport(#[source] hsc_fetcher::Error),

    /// The payload arrived but could not be written or unpacked.
    #[error("failed to unpack content: {0}")]
    Extraction(#[source] hsc_fetcher::Error),

    /// The temporary workspace could not be created.
    #[error("failed to create workspace: {0}")]
    Workspace(#[source] std::io::Error),

    /// Looking up the artifact record failed.
    #[error("failed to look up artifact: {0}")]
    ArtifactLookup(#[source] StoreError),

    /// More than one artifact claims the source as its only owner.
    #[error("{count} artifacts are owned by '{owner}'")]
    AmbiguousOwnership { owner: ObjectKey, count: usize },

    /// Placing or archiving the artifact failed.
    #[error("storage operation failed: {0}")]
    Storage(#[source] hsc_storage::Error),

    /// Creating or updating the artifact record failed.
    #[error("failed to create or update artifact: {0}")]
    ArtifactUpsert(#[source] StoreError),

    /// The source could not be read.
    #[error("failed to load source: {0}")]
    Load(#[source] StoreError),

    /// Writing the source's status failed, possibly after an earlier error.
    #[error("failed to persist status: {source}{}", describe_prior(.prior.as_deref()))]
    StatusPersist {
        #[source]
        source: StoreError,
        prior: Option<Box<Error>>,
    },

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {reason}")]
    TaskFailed { reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

fn describe_prior(prior: Option<&Error>) -> String {
    prior.map_or_else(String::new, |e| format!(" (after: {e})"))
}

impl From<hsc_fetcher::Error> for Error {
    fn from(err: hsc_fetcher::Error) -> Self {
        if err.is_extraction() {
            Self::Extraction(err)
        } else {
            Self::Transport(err)
        }
    }
}

impl Error {
    /// Create a task failed error.
    pub fn task_failed(reason: impl Into<String>) -> Self {
        Self::TaskFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Combine a status write failure with the error that preceded it.
    pub fn status_persist(source: StoreError, prior: Option<Self>) -> Self {
        Self::StatusPersist {
            source,
            prior: prior.map(Box::new),
        }
    }

    /// Condition reason describing this error.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Transport(_) => reasons::FETCH_FAILED,
            Self::Extraction(_) => reasons::EXTRACT_FAILED,
            Self::Workspace(_) => reasons::WORKSPACE_FAILED,
            Self::ArtifactLookup(_) | Self::AmbiguousOwnership { .. } => {
                reasons::ARTIFACT_LOOKUP_FAILED
            }
            Self::Storage(_) | Self::TaskFailed { .. } => reasons::STORAGE_OPERATION_FAILED,
            Self::ArtifactUpsert(_) => reasons::ARTIFACT_UPSERT_FAILED,
            Self::Load(_) => reasons::LOAD_FAILED,
            Self::StatusPersist { prior, .. } => prior
                .as_deref()
                .map_or(reasons::STATUS_PERSIST_FAILED, Self::reason),
            Self::InvalidConfig { .. } => reasons::LOAD_FAILED,
        }
    }

    /// Whether requeueing the source may succeed.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidConfig { .. })
    }

    /// The error that preceded a status write failure, if any.
    pub fn prior(&self) -> Option<&Self> {
        match self {
            Self::StatusPersist { prior, .. } => prior.as_deref(),
            _ => None,
        }
    }
}

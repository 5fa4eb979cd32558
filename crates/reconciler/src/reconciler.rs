//! Reconciler implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hsc_core::{
    Artifact, ConditionStatus, HttpSource, ObjectKey, Resource, ResultExt, archive_filename,
    artifact_key_for,
};
use hsc_fetcher::{FetchCredentials, Fetcher};
use hsc_storage::ArtifactStorage;
use hsc_store::{ObjectStore, StatusStore};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ownership::{OwnershipResolver, OwnershipStrategy};
use crate::revision::{ArtifactFields, RevisionPlan};
use crate::types::{OperationResult, ReconcileOutcome};
use crate::upsert::upsert_artifact;
use crate::workspace::Workspace;

/// Configuration for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Requeue delay after a successful reconciliation.
    #[serde(with = "duration_secs")]
    pub resync_interval: Duration,
    /// Extra attempts when the artifact record changes underneath an upsert.
    pub conflict_retries: usize,
    /// How the artifact record of a source is located.
    pub ownership: OwnershipStrategy,
    /// Parent directory for workspaces. `None` uses the system temp dir.
    pub work_root: Option<PathBuf>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(600),
            conflict_retries: 5,
            ownership: OwnershipStrategy::default(),
            work_root: None,
        }
    }
}

/// Reconciles `Http` sources into stored artifacts.
pub struct HttpSourceReconciler {
    sources: Arc<dyn StatusStore<HttpSource>>,
    artifacts: Arc<dyn ObjectStore<Artifact>>,
    storage: Arc<dyn ArtifactStorage>,
    fetcher: Fetcher,
    credentials: FetchCredentials,
    ownership: OwnershipResolver,
    config: ReconcilerConfig,
}

impl HttpSourceReconciler {
    /// Start building a reconciler.
    pub fn builder() -> ReconcilerBuilder {
        ReconcilerBuilder::new()
    }

    /// Reconcile the source stored under `key`.
    ///
    /// A missing or deleting source is a no-op. Otherwise the source's status
    /// is written exactly once, whether the run succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns the first step that failed; when the status write fails too,
    /// `Error::StatusPersist` carries both.
    pub async fn reconcile(
        &self,
        cancel: &CancellationToken,
        key: &ObjectKey,
    ) -> Result<ReconcileOutcome> {
        let mut source = match self.sources.get(key).await {
            Ok(source) => source,
            Err(e) if e.is_not_found() => {
                debug!(source = %key, "Source not found, nothing to do");
                return Ok(ReconcileOutcome::skipped());
            }
            Err(e) => return Err(Error::Load(e)),
        };

        if source.metadata.is_being_deleted() {
            info!(source = %key, "Source is being deleted, skipping");
            return Ok(ReconcileOutcome::skipped());
        }

        info!(source = %key, url = %source.spec.url, "Starting reconciliation");
        let result = self.reconcile_source(cancel, &mut source).await;

        if let Err(ref e) = result {
            warn!(source = %key, error = %e, reason = e.reason(), "Reconciliation failed");
            source.set_ready(ConditionStatus::False, e.reason(), e.to_string());
        }

        let persisted = self.sources.patch_status(&source).await;
        match (result, persisted) {
            (Ok((revision, operation)), Ok(_)) => {
                info!(
                    source = %key,
                    revision = %revision,
                    operation = %operation,
                    "Reconciliation complete"
                );
                Ok(ReconcileOutcome::stored(
                    revision,
                    operation,
                    self.config.resync_interval,
                ))
            }
            (Ok(_), Err(e)) => Err(Error::status_persist(e, None)),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(e)) => Err(Error::status_persist(e, Some(err))),
        }
    }

    async fn reconcile_source(
        &self,
        cancel: &CancellationToken,
        source: &mut HttpSource,
    ) -> Result<(String, OperationResult)> {
        let workspace = Workspace::acquire(
            self.config.work_root.as_deref(),
            HttpSource::KIND,
            &source.key(),
        )
        .map_err(Error::Workspace)?;

        let result = self.reconcile_in(cancel, source, workspace.path()).await;

        workspace
            .release()
            .warn_on_err("failed to remove workspace");
        result
    }

    async fn reconcile_in(
        &self,
        cancel: &CancellationToken,
        source: &mut HttpSource,
        dir: &Path,
    ) -> Result<(String, OperationResult)> {
        let fetched = self
            .fetcher
            .fetch(cancel, &source.spec.url, dir, &self.credentials)
            .await?;
        let revision = fetched.digest;
        source.status.last_attempted_revision.clone_from(&revision);

        let existing = self.ownership.find_artifact(&*source).await?;
        let plan = RevisionPlan::resolve(&revision, existing.as_ref());
        if plan.is_unchanged() {
            debug!(source = %source.key(), revision = %revision, "Revision unchanged, re-archiving");
        } else {
            debug!(source = %source.key(), revision = %revision, ?plan, "Resolved revision");
        }

        let (archived, artifact_name) = self.store_artifact(source, &revision, dir).await?;
        if let Some(name) = artifact_name {
            source.status.artifact_name = name;
        }

        let key = existing
            .as_ref()
            .map_or_else(|| artifact_key_for(&*source), Resource::key);
        let fields = ArtifactFields::from_archived(&archived, &plan, existing.as_ref(), Utc::now());
        let (_, operation) = upsert_artifact(
            self.artifacts.as_ref(),
            &*source,
            &key,
            &fields,
            self.config.conflict_retries,
        )
        .await
        .map_err(Error::ArtifactUpsert)?;

        source.status.artifact_name = key.name;
        source.mark_ready(&revision);
        self.collect_garbage(source.key(), &revision).await;
        Ok((revision, operation))
    }

    /// Drop superseded archives. Only called after the record points at
    /// `revision`.
    async fn collect_garbage(&self, source: ObjectKey, revision: &str) {
        let storage = Arc::clone(&self.storage);
        let current = archive_filename(revision);
        let key = source.clone();
        let collected = tokio::task::spawn_blocking(move || {
            storage.garbage_collect(HttpSource::KIND, &key, &current)
        })
        .await;

        match collected {
            Ok(Ok(removed)) => {
                if !removed.is_empty() {
                    debug!(source = %source, removed = removed.len(), "Removed superseded archives");
                }
            }
            Ok(Err(e)) => warn!(source = %source, error = %e, "Artifact garbage collection failed"),
            Err(e) => warn!(source = %source, error = %e, "Artifact garbage collection task failed"),
        }
    }

    /// Place and archive the workspace on the blocking pool.
    async fn store_artifact(
        &self,
        source: &HttpSource,
        revision: &str,
        dir: &Path,
    ) -> Result<(Artifact, Option<String>)> {
        let storage = Arc::clone(&self.storage);
        let key = source.key();
        let meta = source.metadata.clone();
        let revision = revision.to_string();
        let dir = dir.to_path_buf();

        tokio::task::spawn_blocking(move || -> hsc_storage::Result<(Artifact, Option<String>)> {
            let kind = HttpSource::KIND;
            let filename = archive_filename(&revision);
            storage.reconcile_storage(kind, &key)?;

            let mut artifact = storage.new_artifact_for(kind, &meta, &revision, &filename);
            let mut archived_name = None;
            storage.reconcile_artifact(
                kind,
                &key,
                &mut artifact,
                &revision,
                &filename,
                &mut |artifact: &Artifact, _revision: &str| {
                    storage.archive(artifact, &dir, None)?;
                    archived_name = Some(artifact.metadata.name.clone());
                    Ok(())
                },
            )?;
            Ok((artifact, archived_name))
        })
        .await
        .map_err(|e| Error::task_failed(e.to_string()))?
        .map_err(Error::Storage)
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Builder for [`HttpSourceReconciler`].
#[derive(Default)]
pub struct ReconcilerBuilder {
    sources: Option<Arc<dyn StatusStore<HttpSource>>>,
    artifacts: Option<Arc<dyn ObjectStore<Artifact>>>,
    storage: Option<Arc<dyn ArtifactStorage>>,
    fetcher: Option<Fetcher>,
    credentials: FetchCredentials,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source store.
    #[must_use]
    pub fn with_sources(mut self, sources: Arc<dyn StatusStore<HttpSource>>) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Set the artifact record store.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Arc<dyn ObjectStore<Artifact>>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Set the artifact storage.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn ArtifactStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set a custom fetcher.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the credentials sent with every fetch.
    #[must_use]
    pub fn with_credentials(mut self, credentials: FetchCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the ownership strategy.
    #[must_use]
    pub const fn ownership(mut self, strategy: OwnershipStrategy) -> Self {
        self.config.ownership = strategy;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` when a store or the storage is missing,
    /// or the default fetcher cannot be created.
    pub fn build(self) -> Result<HttpSourceReconciler> {
        let sources = self
            .sources
            .ok_or_else(|| Error::invalid_config("source store is required"))?;
        let artifacts = self
            .artifacts
            .ok_or_else(|| Error::invalid_config("artifact store is required"))?;
        let storage = self
            .storage
            .ok_or_else(|| Error::invalid_config("artifact storage is required"))?;
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Fetcher::new().map_err(|e| Error::invalid_config(e.to_string()))?,
        };

        let ownership = OwnershipResolver::new(Arc::clone(&artifacts), self.config.ownership);
        Ok(HttpSourceReconciler {
            sources,
            artifacts,
            storage,
            fetcher,
            credentials: self.credentials,
            ownership,
            config: self.config,
        })
    }
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

//! Wiring of stores, storage and reconciler from configuration.

use std::sync::Arc;

use hsc_core::{Artifact, HttpSource};
use hsc_fetcher::{FetchCredentials, Fetcher};
use hsc_reconciler::{HttpSourceReconciler, ReconcilerBuilder};
use hsc_storage::LocalStorage;
use hsc_store::{FsObjectStore, ObjectStore, StatusStore, TracingStore};

use crate::config::ControllerConfig;
use crate::dispatcher::Dispatcher;

/// Source declarations on disk.
pub type SourceStore = TracingStore<FsObjectStore<HttpSource>>;
/// Artifact records on disk.
pub type ArtifactStore = TracingStore<FsObjectStore<Artifact>>;

/// Everything one controller process needs.
pub struct Controller {
    pub config: ControllerConfig,
    pub sources: Arc<SourceStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub reconciler: Arc<HttpSourceReconciler>,
}

impl Controller {
    /// Open the stores under the data directory and build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client or reconciler cannot be built.
    pub fn open(config: ControllerConfig, credentials: FetchCredentials) -> anyhow::Result<Self> {
        let sources = Arc::new(TracingStore::new(FsObjectStore::new(config.objects_dir())));
        let artifacts = Arc::new(TracingStore::new(FsObjectStore::new(config.objects_dir())));
        let storage = LocalStorage::new(config.artifacts_dir(), config.hostname.clone())
            .with_retention(config.retention_records);
        let fetcher = Fetcher::with_config(config.fetcher.clone())?;

        let reconciler = ReconcilerBuilder::new()
            .with_sources(Arc::clone(&sources) as Arc<dyn StatusStore<HttpSource>>)
            .with_artifacts(Arc::clone(&artifacts) as Arc<dyn ObjectStore<Artifact>>)
            .with_storage(Arc::new(storage))
            .with_fetcher(fetcher)
            .with_credentials(credentials)
            .with_config(config.reconciler.clone())
            .build()?;

        Ok(Self {
            config,
            sources,
            artifacts,
            reconciler: Arc::new(reconciler),
        })
    }

    /// Resync loop over this controller's sources.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.reconciler),
            Arc::clone(&self.sources) as Arc<dyn ObjectStore<HttpSource>>,
            self.config.dispatch.clone(),
        )
    }
}

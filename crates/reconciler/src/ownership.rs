//! Finding the artifact record that belongs to a source.

use std::sync::Arc;

use hsc_core::{Artifact, Resource, artifact_key_for};
use hsc_store::ObjectStore;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// How the artifact record of a source is located.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipStrategy {
    /// Look the record up by its derived name.
    #[default]
    DerivedName,
    /// Scan the namespace for the record whose only owner is the source.
    OwnerScan,
}

/// Resolves a source to its artifact record.
#[derive(Clone)]
pub struct OwnershipResolver {
    artifacts: Arc<dyn ObjectStore<Artifact>>,
    strategy: OwnershipStrategy,
}

impl OwnershipResolver {
    /// Create a resolver over an artifact store.
    pub fn new(artifacts: Arc<dyn ObjectStore<Artifact>>, strategy: OwnershipStrategy) -> Self {
        Self {
            artifacts,
            strategy,
        }
    }

    pub const fn strategy(&self) -> OwnershipStrategy {
        self.strategy
    }

    /// The artifact record of `owner`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `Error::ArtifactLookup` when the store fails, and
    /// `Error::AmbiguousOwnership` when an owner scan finds several records.
    pub async fn find_artifact<R: Resource>(&self, owner: &R) -> Result<Option<Artifact>> {
        match self.strategy {
            OwnershipStrategy::DerivedName => self
                .artifacts
                .find(&artifact_key_for(owner))
                .await
                .map_err(Error::ArtifactLookup),
            OwnershipStrategy::OwnerScan => self.scan(owner).await,
        }
    }

    async fn scan<R: Resource>(&self, owner: &R) -> Result<Option<Artifact>> {
        let meta = owner.meta();
        let candidates = self
            .artifacts
            .list(&meta.namespace)
            .await
            .map_err(Error::ArtifactLookup)?;
        debug!(
            owner = %meta.key(),
            candidates = candidates.len(),
            "Scanning artifacts for owner"
        );

        candidates
            .into_iter()
            .filter(|artifact| match artifact.metadata.owner_references.as_slice() {
                [only] => only.refers_to(R::KIND, meta),
                _ => false,
            })
            .at_most_one()
            .map_err(|matches| Error::AmbiguousOwnership {
                owner: meta.key(),
                count: matches.count(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use hsc_core::{ArtifactSpec, HttpSource, ObjectMeta, OwnerReference};
    use hsc_store::InMemoryStore;

    use super::*;

    async fn persisted_source(store: &InMemoryStore<HttpSource>, name: &str) -> HttpSource {
        store
            .create(HttpSource::new("default", name, "http://example.com/x"))
            .await
            .unwrap()
    }

    fn owned_artifact(name: &str, owners: Vec<OwnerReference>) -> Artifact {
        let mut meta = ObjectMeta::new("default", name);
        meta.owner_references = owners;
        Artifact::new(meta, ArtifactSpec::default())
    }

    #[tokio::test]
    async fn test_derived_name_lookup() {
        let sources = InMemoryStore::<HttpSource>::new();
        let source = persisted_source(&sources, "site").await;
        let artifacts = InMemoryStore::<Artifact>::new_arc();
        artifacts
            .create(owned_artifact("http-default-site", vec![]))
            .await
            .unwrap();

        let resolver = OwnershipResolver::new(artifacts, OwnershipStrategy::DerivedName);
        let found = resolver.find_artifact(&source).await.unwrap();
        assert_eq!(found.map(|a| a.metadata.name).as_deref(), Some("http-default-site"));
    }

    #[tokio::test]
    async fn test_derived_name_missing() {
        let source = HttpSource::new("default", "site", "http://example.com/x");
        let resolver = OwnershipResolver::new(
            InMemoryStore::<Artifact>::new_arc(),
            OwnershipStrategy::DerivedName,
        );
        assert!(resolver.find_artifact(&source).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_owner_scan_skips_multi_owner_records() {
        let sources = InMemoryStore::<HttpSource>::new();
        let source = persisted_source(&sources, "site").await;
        let other = persisted_source(&sources, "other").await;

        let artifacts = InMemoryStore::<Artifact>::new_arc();
        artifacts
            .create(owned_artifact("custom-name", vec![source.controller_reference()]))
            .await
            .unwrap();
        artifacts
            .create(owned_artifact(
                "shared",
                vec![source.controller_reference(), other.controller_reference()],
            ))
            .await
            .unwrap();
        artifacts
            .create(owned_artifact("orphan", vec![]))
            .await
            .unwrap();

        let resolver = OwnershipResolver::new(artifacts, OwnershipStrategy::OwnerScan);
        let found = resolver.find_artifact(&source).await.unwrap();
        assert_eq!(found.map(|a| a.metadata.name).as_deref(), Some("custom-name"));
    }

    #[tokio::test]
    async fn test_owner_scan_ambiguous() {
        let sources = InMemoryStore::<HttpSource>::new();
        let source = persisted_source(&sources, "site").await;

        let artifacts = InMemoryStore::<Artifact>::new_arc();
        for name in ["one", "two"] {
            artifacts
                .create(owned_artifact(name, vec![source.controller_reference()]))
                .await
                .unwrap();
        }

        let resolver = OwnershipResolver::new(artifacts, OwnershipStrategy::OwnerScan);
        let err = resolver.find_artifact(&source).await.unwrap_err();
        assert!(matches!(err, Error::AmbiguousOwnership { count: 2, .. }));
    }
}

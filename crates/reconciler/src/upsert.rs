//! Create-or-update of the artifact record.

use hsc_core::{Artifact, ArtifactSpec, ObjectKey, ObjectMeta, Resource};
use hsc_store::{ObjectStore, Result};
use tracing::{debug, warn};

use crate::revision::ArtifactFields;
use crate::types::OperationResult;

/// Bring the record at `key` in line with `fields`.
///
/// The owner reference is attached only when the record is first created;
/// an existing record keeps whatever owners it already has. A record that
/// already matches is not written. `Conflict` and `AlreadyExists` from a
/// concurrent writer trigger a re-read, up to `retries` extra attempts.
///
/// # Errors
///
/// Returns the store error of the last attempt.
pub async fn upsert_artifact<R: Resource>(
    store: &dyn ObjectStore<Artifact>,
    owner: &R,
    key: &ObjectKey,
    fields: &ArtifactFields,
    retries: usize,
) -> Result<(Artifact, OperationResult)> {
    let mut attempt = 0;
    loop {
        let result = try_upsert(store, owner, key, fields).await;
        match result {
            Err(e) if e.is_conflict() && attempt < retries => {
                attempt += 1;
                warn!(artifact = %key, attempt, error = %e, "Artifact changed concurrently, retrying");
            }
            other => return other,
        }
    }
}

async fn try_upsert<R: Resource>(
    store: &dyn ObjectStore<Artifact>,
    owner: &R,
    key: &ObjectKey,
    fields: &ArtifactFields,
) -> Result<(Artifact, OperationResult)> {
    let existing = store.find(key).await?;
    let is_new = existing.is_none();
    let current = existing.unwrap_or_else(|| {
        Artifact::new(
            ObjectMeta::new(key.namespace.clone(), key.name.clone()),
            ArtifactSpec::default(),
        )
    });

    let mut desired = current.clone();
    mutate(&mut desired, owner, fields);

    if is_new {
        let created = store.create(desired).await?;
        debug!(artifact = %key, "Artifact created");
        return Ok((created, OperationResult::Created));
    }
    if desired == current {
        debug!(artifact = %key, "Artifact unchanged");
        return Ok((current, OperationResult::Unchanged));
    }

    let updated = store.update(desired).await?;
    debug!(artifact = %key, "Artifact updated");
    Ok((updated, OperationResult::Updated))
}

fn mutate<R: Resource>(artifact: &mut Artifact, owner: &R, fields: &ArtifactFields) {
    if !artifact.metadata.is_persisted() {
        artifact
            .metadata
            .set_owner_reference(owner.controller_reference());
    }
    fields.apply(&mut artifact.spec);
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use hsc_core::HttpSource;
    use hsc_store::{Error as StoreError, InMemoryStore};

    use super::*;

    fn fields(revision: &str) -> ArtifactFields {
        ArtifactFields {
            revision: revision.to_string(),
            digest: revision.to_string(),
            path: format!("http/default/site/{revision}.tar.gz"),
            url: format!("http://hostname/http/default/site/{revision}.tar.gz"),
            size: Some(10),
            last_update_time: Some(Utc::now()),
        }
    }

    async fn owner() -> HttpSource {
        InMemoryStore::<HttpSource>::new()
            .create(HttpSource::new("default", "site", "http://example.com/x"))
            .await
            .unwrap()
    }

    fn key() -> ObjectKey {
        ObjectKey::new("default", "http-default-site")
    }

    #[tokio::test]
    async fn test_create_sets_owner_reference() {
        let store = InMemoryStore::<Artifact>::new();
        let owner = owner().await;

        let (artifact, op) = upsert_artifact(&store, &owner, &key(), &fields("abc"), 0)
            .await
            .unwrap();

        assert_eq!(op, OperationResult::Created);
        assert_eq!(artifact.metadata.owner_references.len(), 1);
        assert_eq!(artifact.metadata.owner_references[0].uid, owner.metadata.uid);
        assert_eq!(artifact.spec.revision, "abc");
    }

    #[tokio::test]
    async fn test_same_fields_write_nothing() {
        let store = InMemoryStore::<Artifact>::new();
        let owner = owner().await;
        let fields = fields("abc");

        upsert_artifact(&store, &owner, &key(), &fields, 0).await.unwrap();
        let (_, op) = upsert_artifact(&store, &owner, &key(), &fields, 0).await.unwrap();

        assert_eq!(op, OperationResult::Unchanged);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_owner_references() {
        let store = InMemoryStore::<Artifact>::new();
        let owner = owner().await;
        let (created, _) = upsert_artifact(&store, &owner, &key(), &fields("abc"), 0)
            .await
            .unwrap();

        let (updated, op) = upsert_artifact(&store, &owner, &key(), &fields("def"), 0)
            .await
            .unwrap();

        assert_eq!(op, OperationResult::Updated);
        assert_eq!(updated.metadata.uid, created.metadata.uid);
        assert_eq!(updated.metadata.owner_references, created.metadata.owner_references);
        assert_eq!(updated.spec.revision, "def");
    }

    /// Bumps the stored record behind the caller's back on the first update.
    struct RacingStore {
        inner: InMemoryStore<Artifact>,
        raced: AtomicBool,
    }

    #[async_trait]
    impl ObjectStore<Artifact> for RacingStore {
        async fn get(&self, key: &ObjectKey) -> Result<Artifact> {
            self.inner.get(key).await
        }

        async fn list(&self, namespace: &str) -> Result<Vec<Artifact>> {
            self.inner.list(namespace).await
        }

        async fn list_all(&self) -> Result<Vec<Artifact>> {
            self.inner.list_all().await
        }

        async fn create(&self, obj: Artifact) -> Result<Artifact> {
            self.inner.create(obj).await
        }

        async fn update(&self, obj: Artifact) -> Result<Artifact> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let mut sneaky = self.inner.get(&obj.key()).await?;
                sneaky.metadata.labels.insert("touched".into(), "yes".into());
                self.inner.update(sneaky).await?;
            }
            self.inner.update(obj).await
        }
    }

    #[tokio::test]
    async fn test_conflict_is_retried() {
        let store = Arc::new(RacingStore {
            inner: InMemoryStore::new(),
            raced: AtomicBool::new(false),
        });
        let owner = owner().await;
        upsert_artifact(store.as_ref(), &owner, &key(), &fields("abc"), 0)
            .await
            .unwrap();

        let (updated, op) = upsert_artifact(store.as_ref(), &owner, &key(), &fields("def"), 3)
            .await
            .unwrap();

        assert_eq!(op, OperationResult::Updated);
        assert_eq!(updated.spec.revision, "def");
        assert_eq!(updated.metadata.labels.get("touched").map(String::as_str), Some("yes"));
    }

    #[tokio::test]
    async fn test_conflict_without_retries_fails() {
        let store = RacingStore {
            inner: InMemoryStore::new(),
            raced: AtomicBool::new(false),
        };
        let owner = owner().await;
        upsert_artifact(&store, &owner, &key(), &fields("abc"), 0)
            .await
            .unwrap();

        let err = upsert_artifact(&store, &owner, &key(), &fields("def"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }
}

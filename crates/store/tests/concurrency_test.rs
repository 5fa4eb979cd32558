//! Optimistic concurrency across concurrent writers.

use std::sync::Arc;

use hsc_core::{Artifact, ArtifactSpec, ObjectMeta, Resource};
use hsc_store::{Error, FsObjectStore, InMemoryStore, ObjectStore};

type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

async fn race_updates(store: Arc<dyn ObjectStore<Artifact>>) -> TestResult {
    let created = store
        .create(Artifact::new(
            ObjectMeta::new("default", "http-default-site"),
            ArtifactSpec::default(),
        ))
        .await?;

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        let mut candidate = created.clone();
        candidate.spec.revision = format!("rev-{i}");
        handles.push(tokio::spawn(async move { store.update(candidate).await }));
    }

    let mut succeeded = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => succeeded += 1,
            Err(Error::Conflict { .. }) => conflicts += 1,
            Err(other) => return Err(other.into()),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(conflicts, 7);

    let stored = store.get(&created.key()).await?;
    assert_eq!(stored.metadata.resource_version, 2);
    assert_eq!(stored.metadata.uid, created.metadata.uid);
    Ok(())
}

/// GIVEN eight writers holding the same version of an object
/// WHEN they all update it at once
/// THEN exactly one succeeds and the rest see a conflict
#[tokio::test]
async fn test_in_memory_single_winner() -> TestResult {
    race_updates(InMemoryStore::<Artifact>::new_arc()).await
}

/// GIVEN the same race against the file-backed store
/// THEN the outcome is identical
#[tokio::test]
async fn test_fs_single_winner() -> TestResult {
    let dir = tempfile::tempdir()?;
    race_updates(Arc::new(FsObjectStore::<Artifact>::new(dir.path()))).await
}

//! LocalStorage end to end: place, archive, stat, collect.

use std::path::Path;

use hsc_core::{ObjectKey, ObjectMeta};
use hsc_storage::{ArtifactStorage, LocalStorage};
use sha2::{Digest, Sha256};

type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

fn workspace_with(contents: &str) -> std::result::Result<tempfile::TempDir, Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("site"))?;
    std::fs::write(dir.path().join("site/index.html"), contents)?;
    Ok(dir)
}

fn reconcile(
    storage: &LocalStorage,
    workspace: &Path,
    revision: &str,
) -> std::result::Result<hsc_core::Artifact, Box<dyn std::error::Error>> {
    let meta = ObjectMeta::new("default", "test-http");
    let key: ObjectKey = meta.key();
    let filename = format!("{revision}.tar.gz");

    storage.reconcile_storage("Http", &key)?;
    let mut artifact = storage.new_artifact_for("Http", &meta, revision, &filename);
    let mut archived = false;
    storage.reconcile_artifact(
        "Http",
        &key,
        &mut artifact,
        revision,
        &filename,
        &mut |artifact: &hsc_core::Artifact, _revision: &str| {
            archived = true;
            storage.archive(artifact, workspace, None).map(|_| ())
        },
    )?;
    assert!(archived);
    Ok(artifact)
}

/// GIVEN a populated workspace
/// WHEN an artifact is reconciled with an archiving callback
/// THEN the archive exists at the advertised path and its size is recorded
#[test]
fn test_reconcile_artifact_archives_and_stats() -> TestResult {
    let root = tempfile::tempdir()?;
    let storage = LocalStorage::new(root.path(), "hostname");
    let workspace = workspace_with("<h1>v1</h1>")?;

    let artifact = reconcile(&storage, workspace.path(), "rev1")?;

    let path = root.path().join("http/default/test-http/rev1.tar.gz");
    assert!(path.exists());
    assert_eq!(artifact.spec.size, Some(std::fs::metadata(&path)?.len()));
    assert_eq!(artifact.spec.url, "http://hostname/http/default/test-http/rev1.tar.gz");
    Ok(())
}

/// GIVEN the same workspace archived twice
/// THEN the archive bytes are identical
#[test]
fn test_archive_is_reproducible() -> TestResult {
    let root = tempfile::tempdir()?;
    let storage = LocalStorage::new(root.path(), "hostname");
    let workspace = workspace_with("<h1>same</h1>")?;

    reconcile(&storage, workspace.path(), "rev")?;
    let path = root.path().join("http/default/test-http/rev.tar.gz");
    let first = Sha256::digest(std::fs::read(&path)?);

    reconcile(&storage, workspace.path(), "rev")?;
    let second = Sha256::digest(std::fs::read(&path)?);
    assert_eq!(hex::encode(first), hex::encode(second));
    Ok(())
}

/// GIVEN retention of two records
/// WHEN three revisions are stored in turn, collecting after each
/// THEN only the two newest archives remain
#[test]
fn test_retention_limits_archives() -> TestResult {
    let root = tempfile::tempdir()?;
    let storage = LocalStorage::new(root.path(), "hostname").with_retention(2);
    let key = ObjectKey::new("default", "test-http");

    for (revision, body) in [("r1", "one"), ("r2", "two"), ("r3", "three")] {
        let workspace = workspace_with(body)?;
        reconcile(&storage, workspace.path(), revision)?;
        storage.garbage_collect("Http", &key, &format!("{revision}.tar.gz"))?;
        std::thread::sleep(std::time::Duration::from_millis(20));
    }

    let dir = root.path().join("http/default/test-http");
    assert!(!dir.join("r1.tar.gz").exists());
    assert!(dir.join("r2.tar.gz").exists());
    assert!(dir.join("r3.tar.gz").exists());
    Ok(())
}

/// GIVEN retention of a single record
/// WHEN a second revision is archived but not yet collected
/// THEN the archive of the first revision is still on disk
#[test]
fn test_archiving_keeps_previous_revision() -> TestResult {
    let root = tempfile::tempdir()?;
    let storage = LocalStorage::new(root.path(), "hostname").with_retention(1);

    reconcile(&storage, workspace_with("one")?.path(), "r1")?;
    reconcile(&storage, workspace_with("two")?.path(), "r2")?;

    let dir = root.path().join("http/default/test-http");
    assert!(dir.join("r1.tar.gz").exists());
    assert!(dir.join("r2.tar.gz").exists());

    let removed = storage.garbage_collect("Http", &ObjectKey::new("default", "test-http"), "r2.tar.gz")?;
    assert_eq!(removed, vec![dir.join("r1.tar.gz")]);
    Ok(())
}

/// GIVEN a callback that fails
/// THEN the error propagates and no size is recorded
#[test]
fn test_callback_failure_propagates() -> TestResult {
    let root = tempfile::tempdir()?;
    let storage = LocalStorage::new(root.path(), "hostname");
    let meta = ObjectMeta::new("default", "test-http");
    let mut artifact = storage.new_artifact_for("Http", &meta, "rev", "rev.tar.gz");

    let result = storage.reconcile_artifact(
        "Http",
        &meta.key(),
        &mut artifact,
        "rev",
        "rev.tar.gz",
        &mut |_: &hsc_core::Artifact, _: &str| Err(hsc_storage::Error::archive_failed("/nowhere", "boom")),
    );

    assert!(result.is_err());
    assert!(artifact.spec.size.is_none());
    Ok(())
}

//! File-backed store: one JSON document per object.
//!
//! Layout: `<root>/<kind-lowercase>/<namespace>/<name>.json`. Writes go to a
//! temporary sibling and are renamed into place, and all writers take the
//! same lock so a read-check-write sequence is atomic within the process.

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hsc_core::{HasStatus, ObjectKey, Resource, validate_namespace};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::lifecycle::{apply_status, prepare_create, prepare_update};
use crate::store::{ObjectStore, StatusStore};

/// Durable object store rooted at a directory.
pub struct FsObjectStore<R> {
    root: PathBuf,
    write_lock: Mutex<()>,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Resource> FsObjectStore<R> {
    /// Open (or lazily create) a store under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
            _kind: PhantomData,
        }
    }

    /// Directory holding this kind's objects.
    pub fn kind_dir(&self) -> PathBuf {
        self.root.join(R::KIND.to_lowercase())
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        validate_namespace(namespace).map_err(|reason| Error::invalid_key(namespace, reason))?;
        Ok(self.kind_dir().join(namespace))
    }

    fn object_path(&self, key: &ObjectKey) -> Result<PathBuf> {
        key.validate()?;
        Ok(self
            .kind_dir()
            .join(&key.namespace)
            .join(format!("{}.json", key.name)))
    }

    /// All namespaces that hold at least one object of this kind.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` when the kind directory cannot be read.
    pub async fn namespaces(&self) -> Result<Vec<String>> {
        let dir = self.kind_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(dir, e)),
        };

        let mut namespaces = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&dir, e))? {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| Error::io(entry.path(), e))?
                .is_dir();
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && validate_namespace(&name).is_ok() {
                namespaces.push(name);
            }
        }
        namespaces.sort();
        Ok(namespaces)
    }

    async fn read_object(&self, path: &Path) -> Result<Option<R>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    async fn write_object(&self, obj: &R) -> Result<()> {
        let path = self.object_path(&obj.key())?;
        let dir = self.namespace_dir(&obj.meta().namespace)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::io(&dir, e))?;

        let bytes = serde_json::to_vec_pretty(obj)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| Error::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::io(&path, e))
    }
}

#[async_trait]
impl<R: Resource> ObjectStore<R> for FsObjectStore<R> {
    async fn get(&self, key: &ObjectKey) -> Result<R> {
        self.read_object(&self.object_path(key)?)
            .await?
            .ok_or_else(|| Error::not_found(R::KIND, key.clone()))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<R>> {
        let dir = self.namespace_dir(namespace)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(dir, e)),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&dir, e))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(obj) = self.read_object(&path).await? {
                    objects.push(obj);
                }
            }
        }
        objects.sort_by(|a: &R, b: &R| a.meta().name.cmp(&b.meta().name));
        Ok(objects)
    }

    async fn list_all(&self) -> Result<Vec<R>> {
        let mut objects = Vec::new();
        for namespace in self.namespaces().await? {
            objects.extend(self.list(&namespace).await?);
        }
        Ok(objects)
    }

    async fn create(&self, obj: R) -> Result<R> {
        let _guard = self.write_lock.lock().await;
        let key = obj.key();
        if self.read_object(&self.object_path(&key)?).await?.is_some() {
            return Err(Error::already_exists(R::KIND, key));
        }

        let created = prepare_create(obj)?;
        self.write_object(&created).await?;
        Ok(created)
    }

    async fn update(&self, obj: R) -> Result<R> {
        let _guard = self.write_lock.lock().await;
        let key = obj.key();
        let stored = self
            .read_object(&self.object_path(&key)?)
            .await?
            .ok_or_else(|| Error::not_found(R::KIND, key))?;

        let updated = prepare_update(&stored, obj)?;
        self.write_object(&updated).await?;
        Ok(updated)
    }
}

#[async_trait]
impl<R: HasStatus> StatusStore<R> for FsObjectStore<R> {
    async fn patch_status(&self, obj: &R) -> Result<R> {
        let _guard = self.write_lock.lock().await;
        let key = obj.key();
        let stored = self
            .read_object(&self.object_path(&key)?)
            .await?
            .ok_or_else(|| Error::not_found(R::KIND, key))?;

        let patched = apply_status(&stored, obj);
        self.write_object(&patched).await?;
        Ok(patched)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use hsc_core::HttpSource;

    use super::*;

    #[tokio::test]
    async fn test_objects_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let created = {
            let store = FsObjectStore::<HttpSource>::new(dir.path());
            store
                .create(HttpSource::new("default", "site", "http://example.com/a"))
                .await
                .unwrap()
        };

        let reopened: FsObjectStore<HttpSource> = FsObjectStore::new(dir.path());
        let fetched = reopened.get(&created.key()).await.unwrap();
        assert_eq!(fetched, created);
        assert!(dir.path().join("http/default/site.json").exists());
    }

    #[tokio::test]
    async fn test_update_conflict_and_status_patch() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::<HttpSource>::new(dir.path());
        let created = store
            .create(HttpSource::new("default", "site", "http://example.com/a"))
            .await
            .unwrap();

        let mut moved = created.clone();
        moved.spec.url = "http://example.com/b".into();
        let updated = store.update(moved).await.unwrap();
        assert_eq!(updated.metadata.generation, 2);

        let err = store.update(created.clone()).await.unwrap_err();
        assert!(err.is_conflict());

        let mut status = created;
        status.status.artifact_name = "http-default-site".into();
        let patched = store.patch_status(&status).await.unwrap();
        assert_eq!(patched.spec.url, "http://example.com/b");
        assert_eq!(patched.status.artifact_name, "http-default-site");
    }

    #[tokio::test]
    async fn test_unsafe_keys_never_reach_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("objects");
        let store = FsObjectStore::<HttpSource>::new(&root);

        let err = store
            .create(HttpSource::new("../../../escaped", "pwned", "http://example.com/a"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));

        let err = store
            .get(&ObjectKey::new("default", "../../site"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));
        assert!(store.list("..").await.is_err());

        assert!(!dir.path().join("escaped").exists());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_list_and_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::<HttpSource>::new(dir.path());
        assert!(store.namespaces().await.unwrap().is_empty());

        for (ns, name) in [("default", "b"), ("default", "a"), ("team", "c")] {
            store
                .create(HttpSource::new(ns, name, "http://example.com/x"))
                .await
                .unwrap();
        }

        let listed = store.list("default").await.unwrap();
        let names: Vec<&str> = listed.iter().map(|s| s.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(store.namespaces().await.unwrap(), vec!["default", "team"]);
        assert_eq!(store.list_all().await.unwrap().len(), 3);
    }
}

//! Object store traits and the in-memory implementation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hsc_core::{HasStatus, ObjectKey, Resource};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::lifecycle::{apply_status, prepare_create, prepare_update};

/// Keyed storage for one kind of declarative object.
#[async_trait]
pub trait ObjectStore<R: Resource>: Send + Sync {
    /// Read the object stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` when nothing is stored under the key.
    async fn get(&self, key: &ObjectKey) -> Result<R>;

    /// All objects in a namespace, ordered by name.
    async fn list(&self, namespace: &str) -> Result<Vec<R>>;

    /// All objects of this kind, ordered by namespace then name.
    async fn list_all(&self) -> Result<Vec<R>>;

    /// Store a new object. Returns it with identity and version stamped.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyExists` when the key is taken.
    async fn create(&self, obj: R) -> Result<R>;

    /// Replace a stored object, conditioned on its resource version.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for unknown keys and `Error::Conflict` when
    /// the stored version differs from the one `obj` was read at.
    async fn update(&self, obj: R) -> Result<R>;

    /// Like [`ObjectStore::get`], mapping `NotFound` to `None`.
    async fn find(&self, key: &ObjectKey) -> Result<Option<R>> {
        match self.get(key).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A store whose objects carry a separately written status.
#[async_trait]
pub trait StatusStore<R: HasStatus>: ObjectStore<R> {
    /// Overwrite the stored object's status with `obj`'s.
    ///
    /// Unconditional: the resource version of `obj` is not checked, so the
    /// call can be repeated safely.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` when the object no longer exists.
    async fn patch_status(&self, obj: &R) -> Result<R>;
}

/// In-memory store for tests and one-shot runs.
pub struct InMemoryStore<R> {
    objects: RwLock<BTreeMap<ObjectKey, R>>,
    writes: AtomicUsize,
    status_patches: AtomicUsize,
}

impl<R> Default for InMemoryStore<R> {
    fn default() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            writes: AtomicUsize::new(0),
            status_patches: AtomicUsize::new(0),
        }
    }
}

impl<R: Resource> InMemoryStore<R> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of successful `create` and `update` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of successful `patch_status` calls.
    pub fn status_patch_count(&self) -> usize {
        self.status_patches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: Resource> ObjectStore<R> for InMemoryStore<R> {
    async fn get(&self, key: &ObjectKey) -> Result<R> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(R::KIND, key.clone()))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<R>> {
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.namespace == namespace)
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<R>> {
        Ok(self.objects.read().await.values().cloned().collect())
    }

    async fn create(&self, obj: R) -> Result<R> {
        let key = obj.key();
        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            return Err(Error::already_exists(R::KIND, key));
        }

        let created = prepare_create(obj)?;
        objects.insert(key, created.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn update(&self, obj: R) -> Result<R> {
        let key = obj.key();
        let mut objects = self.objects.write().await;
        let stored = objects
            .get(&key)
            .ok_or_else(|| Error::not_found(R::KIND, key.clone()))?;

        let updated = prepare_update(stored, obj)?;
        objects.insert(key, updated.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }
}

#[async_trait]
impl<R: HasStatus> StatusStore<R> for InMemoryStore<R> {
    async fn patch_status(&self, obj: &R) -> Result<R> {
        let key = obj.key();
        let mut objects = self.objects.write().await;
        let stored = objects
            .get(&key)
            .ok_or_else(|| Error::not_found(R::KIND, key.clone()))?;

        let patched = apply_status(stored, obj);
        objects.insert(key, patched.clone());
        self.status_patches.fetch_add(1, Ordering::SeqCst);
        Ok(patched)
    }
}

/// A wrapper that adds tracing to a store.
pub struct TracingStore<S> {
    inner: S,
}

impl<S> TracingStore<S> {
    /// Create a new tracing store.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<R: Resource, S: ObjectStore<R>> ObjectStore<R> for TracingStore<S> {
    async fn get(&self, key: &ObjectKey) -> Result<R> {
        tracing::trace!(kind = R::KIND, key = %key, "Reading object");
        self.inner.get(key).await
    }

    async fn list(&self, namespace: &str) -> Result<Vec<R>> {
        tracing::debug!(kind = R::KIND, namespace, "Listing objects");
        self.inner.list(namespace).await
    }

    async fn list_all(&self) -> Result<Vec<R>> {
        tracing::debug!(kind = R::KIND, "Listing objects in all namespaces");
        self.inner.list_all().await
    }

    async fn create(&self, obj: R) -> Result<R> {
        tracing::debug!(kind = R::KIND, key = %obj.key(), "Creating object");
        let result = self.inner.create(obj).await;
        if let Ok(ref created) = result {
            tracing::trace!(
                uid = %created.meta().uid,
                resource_version = created.meta().resource_version,
                "Object created"
            );
        }
        result
    }

    async fn update(&self, obj: R) -> Result<R> {
        tracing::debug!(
            kind = R::KIND,
            key = %obj.key(),
            resource_version = obj.meta().resource_version,
            "Updating object"
        );
        let result = self.inner.update(obj).await;
        if let Err(ref e) = result {
            tracing::debug!(error = %e, "Update rejected");
        }
        result
    }
}

#[async_trait]
impl<R: HasStatus, S: StatusStore<R>> StatusStore<R> for TracingStore<S> {
    async fn patch_status(&self, obj: &R) -> Result<R> {
        tracing::debug!(kind = R::KIND, key = %obj.key(), "Patching status");
        self.inner.patch_status(obj).await
    }
}

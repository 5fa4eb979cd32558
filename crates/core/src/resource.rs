//! Traits implemented by every kind the stores can hold.

use std::fmt::Debug;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::meta::{ObjectKey, ObjectMeta, OwnerReference};

/// A stored, namespaced object with metadata and a spec.
pub trait Resource: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind name, e.g. `Http`.
    const KIND: &'static str;
    /// Group/version string, e.g. `source.hsc.dev/v1alpha1`.
    const API_VERSION: &'static str;

    /// Desired state; a change to it bumps the object's generation.
    type Spec: PartialEq + Debug;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;
    fn spec(&self) -> &Self::Spec;

    /// Key this object is stored under.
    fn key(&self) -> ObjectKey {
        self.meta().key()
    }

    /// Controller owner reference pointing at this object.
    fn controller_reference(&self) -> OwnerReference {
        let meta = self.meta();
        OwnerReference {
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            name: meta.name.clone(),
            uid: meta.uid.clone(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }
}

/// A resource with a separately patched status subresource.
pub trait HasStatus: Resource {
    type Status: Clone + Debug + PartialEq + Default + Send + Sync;

    fn status(&self) -> &Self::Status;
    fn status_mut(&mut self) -> &mut Self::Status;
}

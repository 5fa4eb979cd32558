//! Server-side bookkeeping applied on every write, shared by all backends.

use chrono::Utc;
use hsc_core::{HasStatus, Resource};
use ulid::Ulid;

use crate::error::{Error, Result};

/// Stamp a new object: uid, creation time, first generation and version.
///
/// Fails with `InvalidKey` when the namespace or name is not a valid identifier.
pub(crate) fn prepare_create<R: Resource>(mut obj: R) -> Result<R> {
    obj.key().validate()?;
    let meta = obj.meta_mut();
    meta.uid = Ulid::new().to_string();
    meta.creation_timestamp = Some(Utc::now());
    meta.generation = 1;
    meta.resource_version = 1;
    Ok(obj)
}

/// Merge an update into the stored object.
///
/// Fails with `Conflict` when `obj` was read at a different version. Identity
/// fields stay as stored; a spec change bumps the generation.
pub(crate) fn prepare_update<R: Resource>(stored: &R, mut obj: R) -> Result<R> {
    let current = stored.meta();
    let expected = obj.meta().resource_version;
    if expected != current.resource_version {
        return Err(Error::conflict(
            R::KIND,
            current.key(),
            expected,
            current.resource_version,
        ));
    }

    let spec_changed = stored.spec() != obj.spec();
    let meta = obj.meta_mut();
    meta.uid.clone_from(&current.uid);
    meta.creation_timestamp = current.creation_timestamp;
    meta.generation = if spec_changed {
        current.generation + 1
    } else {
        current.generation
    };
    meta.resource_version = current.resource_version + 1;
    Ok(obj)
}

/// Copy the status of `obj` onto the stored object.
pub(crate) fn apply_status<R: HasStatus>(stored: &R, obj: &R) -> R {
    let mut next = stored.clone();
    *next.status_mut() = obj.status().clone();
    next.meta_mut().resource_version = stored.meta().resource_version + 1;
    next
}

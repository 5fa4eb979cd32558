//! Per-reconciliation scratch directory.

use std::io;
use std::path::Path;

use hsc_core::ObjectKey;
use tempfile::TempDir;
use tracing::debug;

/// Temporary directory holding one fetched payload.
///
/// Named `<kind>-<namespace>-<name>-<random>` so leftovers can be traced back
/// to their source. Dropping it removes the directory silently; call
/// [`Workspace::release`] to observe removal errors.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under `base`, or the system temp dir.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a key that is not a valid identifier, and
    /// the I/O error from creating the directory.
    pub fn acquire(base: Option<&Path>, kind: &str, source: &ObjectKey) -> io::Result<Self> {
        source
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let prefix = format!("{kind}-{}-{}-", source.namespace, source.name);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match base {
            Some(base) => builder.tempdir_in(base)?,
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "Workspace acquired");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from removing the directory.
    pub fn release(self) -> io::Result<()> {
        self.dir.close()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_release() {
        let base = tempfile::tempdir().unwrap();
        let workspace =
            Workspace::acquire(Some(base.path()), "Http", &ObjectKey::new("default", "site")).unwrap();

        let path = workspace.path().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Http-default-site-"));
        std::fs::write(path.join("payload"), "x").unwrap();

        workspace.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_unsafe_key_is_rejected() {
        let base = tempfile::tempdir().unwrap();
        let err = Workspace::acquire(Some(base.path()), "Http", &ObjectKey::new("default", "../../x"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(std::fs::read_dir(base.path()).unwrap().next().is_none());
    }
}

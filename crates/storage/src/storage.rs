//! The artifact storage trait and its filesystem implementation.

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use hsc_core::{ARCHIVE_EXTENSION, Artifact, ArtifactSpec, ObjectKey, ObjectMeta, artifact_name};
use tracing::{debug, info};

use crate::archive::{ArchiveFilter, write_tar_gz};
use crate::error::{Error, Result};

/// Default number of archives kept per source, the current one included.
pub const DEFAULT_RETENTION_RECORDS: usize = 2;

/// Callback run by [`ArtifactStorage::reconcile_artifact`] once the
/// artifact's directory is in place. Receives the artifact and revision.
pub type ArtifactCallback<'a> = &'a mut dyn FnMut(&Artifact, &str) -> Result<()>;

/// Places, archives, and serves artifacts.
///
/// Methods are blocking; async callers run them on the blocking pool.
pub trait ArtifactStorage: Send + Sync {
    /// Ensure the storage directory for a source exists and return it.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` when the key is not a valid identifier and
    /// `Error::Io` if the directory cannot be created.
    fn reconcile_storage(&self, kind: &str, source: &ObjectKey) -> Result<PathBuf>;

    /// Build an unpersisted artifact record for `revision` of `source`.
    fn new_artifact_for(&self, kind: &str, source: &ObjectMeta, revision: &str, filename: &str) -> Artifact;

    /// Make sure `artifact` points at `filename` for `revision`, run
    /// `callback`, then record the archive size.
    ///
    /// Older archives are left alone; the caller drops them with
    /// [`ArtifactStorage::garbage_collect`] once the artifact record points at
    /// the new one.
    ///
    /// # Errors
    ///
    /// Propagates the callback's error; returns `Error::Io` when the archive
    /// cannot be placed or stat'ed.
    fn reconcile_artifact(
        &self,
        kind: &str,
        source: &ObjectKey,
        artifact: &mut Artifact,
        revision: &str,
        filename: &str,
        callback: ArtifactCallback<'_>,
    ) -> Result<()>;

    /// Archive `dir` into the artifact's location. Returns the archive size.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` for artifacts outside the storage root,
    /// and `Error::Io` / `Error::ArchiveFailed` when writing fails.
    fn archive(&self, artifact: &Artifact, dir: &Path, filter: Option<ArchiveFilter<'_>>) -> Result<u64>;

    /// Drop archives of `source` beyond the retention limit, newest first.
    /// `current` names the archive the artifact record points at and is
    /// always kept.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` for an invalid key and `Error::Io` when
    /// the directory cannot be listed or a file cannot be removed.
    fn garbage_collect(&self, kind: &str, source: &ObjectKey, current: &str) -> Result<Vec<PathBuf>>;

    /// Public URL of a stored file.
    fn artifact_url(&self, kind: &str, namespace: &str, name: &str, filename: &str) -> String;

    /// Local path of the artifact's archive.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` when the artifact's path escapes the root.
    fn local_path(&self, artifact: &Artifact) -> Result<PathBuf>;
}

/// Artifact storage rooted at a local directory.
///
/// Layout: `<root>/<kind-lowercase>/<namespace>/<name>/<revision>.tar.gz`,
/// served as `http://<hostname>/<same path>`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    hostname: String,
    retention_records: usize,
}

impl LocalStorage {
    /// Create storage under `root`, advertised at `hostname`.
    pub fn new(root: impl Into<PathBuf>, hostname: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            hostname: hostname.into(),
            retention_records: DEFAULT_RETENTION_RECORDS,
        }
    }

    /// Set how many archives to keep per source. Values below one keep one.
    #[must_use]
    pub fn with_retention(mut self, records: usize) -> Self {
        self.retention_records = records.max(1);
        self
    }

    /// Storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn source_dir(&self, kind: &str, source: &ObjectKey) -> Result<PathBuf> {
        source
            .validate()
            .map_err(|e| Error::invalid_path(source.to_string(), e.to_string()))?;
        Ok(self
            .root
            .join(kind.to_lowercase())
            .join(&source.namespace)
            .join(&source.name))
    }

    fn relative_path(kind: &str, source: &ObjectKey, filename: &str) -> String {
        format!(
            "{}/{}/{}/{filename}",
            kind.to_lowercase(),
            source.namespace,
            source.name
        )
    }

    /// Remove archives in `dir` beyond the retention limit, newest kept.
    /// The archive named `current` is never removed.
    fn prune(&self, dir: &Path, current: &str) -> Result<Vec<PathBuf>> {
        let suffix = format!(".{ARCHIVE_EXTENSION}");
        let mut archives: Vec<(SystemTime, PathBuf)> = Vec::new();

        let read = match std::fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io("read_dir", dir, e)),
        };
        for entry in read {
            let entry = entry.map_err(|e| Error::io("read_dir", dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(&suffix) || name == current {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| Error::io("stat", entry.path(), e))?;
            archives.push((modified, entry.path()));
        }

        archives.sort_by(|a, b| b.cmp(a));
        let keep_others = self.retention_records.saturating_sub(1);
        let mut removed = Vec::new();
        for (_, path) in archives.into_iter().skip(keep_others) {
            std::fs::remove_file(&path).map_err(|e| Error::io("remove", &path, e))?;
            debug!(path = %path.display(), "Removed superseded archive");
            removed.push(path);
        }
        Ok(removed)
    }
}

impl ArtifactStorage for LocalStorage {
    fn reconcile_storage(&self, kind: &str, source: &ObjectKey) -> Result<PathBuf> {
        let dir = self.source_dir(kind, source)?;
        std::fs::create_dir_all(&dir).map_err(|e| Error::io("create_dir", &dir, e))?;
        Ok(dir)
    }

    fn new_artifact_for(&self, kind: &str, source: &ObjectMeta, revision: &str, filename: &str) -> Artifact {
        let key = source.key();
        let meta = ObjectMeta::new(
            source.namespace.clone(),
            artifact_name(kind, &source.namespace, &source.name),
        );
        Artifact::new(
            meta,
            ArtifactSpec {
                path: Self::relative_path(kind, &key, filename),
                url: self.artifact_url(kind, &source.namespace, &source.name, filename),
                revision: revision.to_string(),
                digest: revision.to_string(),
                last_update_time: None,
                size: None,
            },
        )
    }

    fn reconcile_artifact(
        &self,
        kind: &str,
        source: &ObjectKey,
        artifact: &mut Artifact,
        revision: &str,
        filename: &str,
        callback: ArtifactCallback<'_>,
    ) -> Result<()> {
        self.reconcile_storage(kind, source)?;

        artifact.spec.path = Self::relative_path(kind, source, filename);
        artifact.spec.url = self.artifact_url(kind, &source.namespace, &source.name, filename);
        artifact.spec.revision = revision.to_string();
        artifact.spec.digest = revision.to_string();

        callback(artifact, revision)?;

        let path = self.local_path(artifact)?;
        let size = std::fs::metadata(&path)
            .map_err(|e| Error::io("stat", &path, e))?
            .len();
        artifact.spec.size = Some(size);
        Ok(())
    }

    fn garbage_collect(&self, kind: &str, source: &ObjectKey, current: &str) -> Result<Vec<PathBuf>> {
        let dir = self.source_dir(kind, source)?;
        self.prune(&dir, current)
    }

    fn archive(&self, artifact: &Artifact, dir: &Path, filter: Option<ArchiveFilter<'_>>) -> Result<u64> {
        let target = self.local_path(artifact)?;
        let parent = target
            .parent()
            .ok_or_else(|| Error::invalid_path(&artifact.spec.path, "no parent directory"))?;
        std::fs::create_dir_all(parent).map_err(|e| Error::io("create_dir", parent, e))?;

        let tmp = tempfile::Builder::new()
            .prefix(".archive-")
            .tempfile_in(parent)
            .map_err(|e| Error::io("create_temp", parent, e))?;
        let tmp = write_tar_gz(dir, filter, tmp)?;
        let file = tmp
            .persist(&target)
            .map_err(|e| Error::io("rename", &target, e.error))?;

        let size = file
            .metadata()
            .map_err(|e| Error::io("stat", &target, e))?
            .len();
        info!(path = %target.display(), size, "Archived artifact");
        Ok(size)
    }

    fn artifact_url(&self, kind: &str, namespace: &str, name: &str, filename: &str) -> String {
        format!(
            "http://{}/{}/{namespace}/{name}/{filename}",
            self.hostname,
            kind.to_lowercase()
        )
    }

    fn local_path(&self, artifact: &Artifact) -> Result<PathBuf> {
        let relative = Path::new(&artifact.spec.path);
        if artifact.spec.path.is_empty() {
            return Err(Error::invalid_path("", "artifact has no path"));
        }
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(Error::invalid_path(
                &artifact.spec.path,
                "path must be relative without '..'",
            ));
        }
        Ok(self.root.join(relative))
    }
}

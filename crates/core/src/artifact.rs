//! The `Artifact` record and the naming rules tying it to its source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::{ObjectKey, ObjectMeta};
use crate::resource::Resource;

/// Kind name of the artifact record.
pub const ARTIFACT_KIND: &str = "Artifact";

/// Group/version of the artifact record.
pub const ARTIFACT_API_VERSION: &str = "artifact.hsc.dev/v1alpha1";

/// File extension of every archived payload.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Description of the last successfully archived payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSpec {
    /// Archive location relative to the storage root.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Where the archive is served.
    pub url: String,
    /// Hex SHA-256 of the fetched payload.
    pub revision: String,
    /// Same value as `revision` for the single supported hash algorithm.
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
    /// Byte length of the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Durable record of the artifact produced for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ArtifactSpec,
}

fn default_api_version() -> String {
    ARTIFACT_API_VERSION.to_string()
}

fn default_kind() -> String {
    ARTIFACT_KIND.to_string()
}

impl Artifact {
    /// Create an unpersisted record.
    pub fn new(metadata: ObjectMeta, spec: ArtifactSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata,
            spec,
        }
    }
}

impl Resource for Artifact {
    const KIND: &'static str = ARTIFACT_KIND;
    const API_VERSION: &'static str = ARTIFACT_API_VERSION;

    type Spec = ArtifactSpec;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn spec(&self) -> &ArtifactSpec {
        &self.spec
    }
}

/// Deterministic artifact record name: `<kind>-<namespace>-<name>`, kind lowercased.
pub fn artifact_name(kind: &str, namespace: &str, name: &str) -> String {
    format!("{}-{namespace}-{name}", kind.to_lowercase())
}

/// Key of the artifact record owned by the given object.
pub fn artifact_key_for<R: Resource>(owner: &R) -> ObjectKey {
    let meta = owner.meta();
    ObjectKey::new(
        meta.namespace.clone(),
        artifact_name(R::KIND, &meta.namespace, &meta.name),
    )
}

/// Archive filename for a revision: `<revision>.tar.gz`.
pub fn archive_filename(revision: &str) -> String {
    format!("{revision}.{ARCHIVE_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::HttpSource;

    #[test]
    fn test_artifact_name_lowercases_kind() {
        assert_eq!(
            artifact_name("Http", "default", "test-http"),
            "http-default-test-http"
        );
    }

    #[test]
    fn test_artifact_key_for_source() {
        let source = HttpSource::new("default", "test-http-2", "http://example.com/x");
        let key = artifact_key_for(&source);
        assert_eq!(key, ObjectKey::new("default", "http-default-test-http-2"));
    }

    #[test]
    fn test_archive_filename() {
        assert_eq!(archive_filename("abc"), "abc.tar.gz");
    }
}

//! The `Http` source declaration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::condition::{Condition, ConditionStatus, reasons, set_condition, types};
use crate::error::Error;
use crate::meta::{ObjectMeta, validate_name, validate_namespace};
use crate::resource::{HasStatus, Resource};

/// Kind name of the source declaration.
pub const HTTP_SOURCE_KIND: &str = "Http";

/// Group/version of the source declaration.
pub const HTTP_SOURCE_API_VERSION: &str = "source.hsc.dev/v1alpha1";

/// Desired state: where to get the payload from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSourceSpec {
    /// Remote location of the payload.
    pub url: String,
}

/// Observed state written by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSourceStatus {
    /// Last reconciled spec generation.
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Revision of the last successfully stored artifact.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_applied_revision: String,
    /// Revision seen by the last reconciliation attempt.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_attempted_revision: String,
    /// Name of the generated artifact record.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artifact_name: String,
}

/// A declared remote HTTP resource to mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: HttpSourceSpec,
    #[serde(default)]
    pub status: HttpSourceStatus,
}

fn default_api_version() -> String {
    HTTP_SOURCE_API_VERSION.to_string()
}

fn default_kind() -> String {
    HTTP_SOURCE_KIND.to_string()
}

impl HttpSource {
    /// Create an unpersisted declaration.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta::new(namespace, name),
            spec: HttpSourceSpec { url: url.into() },
            status: HttpSourceStatus::default(),
        }
    }

    /// Check kind and URL before the declaration is accepted by a store.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidResource` when the kind is wrong, the name or
    /// namespace is not a DNS-1123 identifier, or the URL is not an absolute
    /// `http`/`https` URL.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |reason: String| {
            Error::invalid_resource(HTTP_SOURCE_KIND, self.metadata.name.clone(), reason)
        };

        if self.kind != HTTP_SOURCE_KIND {
            return Err(invalid(format!("unexpected kind '{}'", self.kind)));
        }
        validate_namespace(&self.metadata.namespace).map_err(invalid)?;
        validate_name(&self.metadata.name).map_err(invalid)?;

        let url = Url::parse(&self.spec.url)
            .map_err(|e| invalid(format!("invalid url '{}': {e}", self.spec.url)))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(invalid(format!("unsupported url scheme '{other}'"))),
        }
    }

    /// Parse one or more YAML documents into declarations.
    ///
    /// # Errors
    ///
    /// Returns a YAML error for malformed documents and a validation error for
    /// documents that are not valid `Http` declarations.
    pub fn from_yaml_documents(input: &str) -> Result<Vec<Self>, Error> {
        serde_yaml::Deserializer::from_str(input)
            .map(|document| -> Result<Self, Error> {
                let source = Self::deserialize(document)?;
                source.validate()?;
                Ok(source)
            })
            .collect()
    }

    /// Record a ready/not-ready observation for the current generation.
    pub fn set_ready(&mut self, status: ConditionStatus, reason: &str, message: impl Into<String>) {
        let generation = self.metadata.generation;
        set_condition(
            &mut self.status.conditions,
            Condition::new(types::READY, status, reason, message).with_generation(generation),
        );
    }

    /// Mark the current generation as successfully reconciled at `revision`.
    pub fn mark_ready(&mut self, revision: &str) {
        self.status.last_applied_revision = revision.to_string();
        self.status.observed_generation = self.metadata.generation;
        self.set_ready(
            ConditionStatus::True,
            reasons::SUCCEEDED,
            format!("stored artifact for revision '{revision}'"),
        );
    }
}

impl Resource for HttpSource {
    const KIND: &'static str = HTTP_SOURCE_KIND;
    const API_VERSION: &'static str = HTTP_SOURCE_API_VERSION;

    type Spec = HttpSourceSpec;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn spec(&self) -> &HttpSourceSpec {
        &self.spec
    }
}

impl HasStatus for HttpSource {
    type Status = HttpSourceStatus;

    fn status(&self) -> &HttpSourceStatus {
        &self.status
    }

    fn status_mut(&mut self) -> &mut HttpSourceStatus {
        &mut self.status
    }
}

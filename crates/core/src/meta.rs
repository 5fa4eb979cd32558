//! Object identity and metadata shared by every stored resource.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Namespace used when a manifest or key omits one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Longest accepted namespace (a DNS-1123 label).
pub const MAX_NAMESPACE_LENGTH: usize = 63;
/// Longest accepted object name (a DNS-1123 subdomain).
pub const MAX_NAME_LENGTH: usize = 253;

const fn is_label_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

/// Check one DNS-1123 label: lowercase alphanumerics and `-`, starting and
/// ending with an alphanumeric.
fn check_label(label: &str) -> Result<(), String> {
    let edges = (label.chars().next(), label.chars().last());
    let (Some(first), Some(last)) = edges else {
        return Err("empty segment".to_string());
    };
    if !is_label_char(first) || !is_label_char(last) {
        return Err(format!(
            "'{label}' must start and end with a lowercase letter or digit"
        ));
    }
    if let Some(bad) = label.chars().find(|c| !is_label_char(*c) && *c != '-') {
        return Err(format!("'{label}' contains invalid character '{bad}'"));
    }
    Ok(())
}

/// Validate a namespace. Namespaces become a single path segment on disk.
///
/// # Errors
///
/// Returns a description of the first rule the namespace breaks.
pub fn validate_namespace(namespace: &str) -> Result<(), String> {
    if namespace.len() > MAX_NAMESPACE_LENGTH {
        return Err(format!("namespace longer than {MAX_NAMESPACE_LENGTH} characters"));
    }
    check_label(namespace).map_err(|reason| format!("invalid namespace: {reason}"))
}

/// Validate an object name: dot-separated DNS-1123 labels, so `/`, `..`
/// and leading dots never reach a file path.
///
/// # Errors
///
/// Returns a description of the first rule the name breaks.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.len() > MAX_NAME_LENGTH {
        return Err(format!("name longer than {MAX_NAME_LENGTH} characters"));
    }
    name.split('.')
        .try_for_each(check_label)
        .map_err(|reason| format!("invalid name: {reason}"))
}

/// Namespace-scoped identity of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Create a new key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Check that both parts are safe to use as path segments.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` naming the offending part.
    pub fn validate(&self) -> Result<(), Error> {
        validate_namespace(&self.namespace)
            .and_then(|()| validate_name(&self.name))
            .map_err(|reason| Error::invalid_key(self.to_string(), reason))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = Error;

    /// Parses `namespace/name`, or a bare `name` in the default namespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let key = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => Self::new(DEFAULT_NAMESPACE, name),
            (Some(namespace), Some(name), None) => Self::new(namespace, name),
            _ => return Err(Error::invalid_key(s, "expected <namespace>/<name>")),
        };

        key.validate()?;
        Ok(key)
    }
}

/// Back-pointer from a dependent object to the object that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_owner_deletion: Option<bool>,
}

impl OwnerReference {
    /// Whether this reference names the object with the given kind and metadata.
    ///
    /// UIDs are compared only when both sides carry one.
    pub fn refers_to(&self, kind: &str, meta: &ObjectMeta) -> bool {
        let uid_matches = self.uid.is_empty() || meta.uid.is_empty() || self.uid == meta.uid;
        self.kind == kind && self.name == meta.name && uid_matches
    }
}

/// Metadata carried by every stored object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Spec generation, bumped by the store whenever the spec changes.
    #[serde(default)]
    pub generation: i64,
    /// Optimistic-concurrency token, bumped on every write.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl ObjectMeta {
    /// Create metadata for a not-yet-persisted object.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// The key this object is stored under.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// Whether deletion has been requested.
    pub const fn is_being_deleted(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Whether the object has ever been persisted (creation timestamp set).
    pub const fn is_persisted(&self) -> bool {
        self.creation_timestamp.is_some()
    }

    /// Add an owner reference, replacing any existing reference to the same owner.
    pub fn set_owner_reference(&mut self, reference: OwnerReference) {
        self.owner_references
            .retain(|r| !(r.kind == reference.kind && r.name == reference.name));
        self.owner_references.push(reference);
    }
}

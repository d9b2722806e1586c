use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// Configuration types shared across all Berth crates
pub mod config;

// Re-export commonly used config types for convenience
pub use config::{ClusterConfig, ConfigError, ConsoleConfig, ServerConfig};

/// One named, typed cluster object, exactly as the cluster API exchanges it.
///
/// Only the envelope (`apiVersion`, `kind`, `metadata`) is typed. The rest of
/// the document (`spec`, `data`, `stringData`, ...) stays raw JSON in `body`,
/// so server-populated fields survive a read-modify-write cycle without the
/// console having to know every schema it touches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

/// Standard object metadata.
///
/// Fields the console never manages (uid, creationTimestamp, managedFields,
/// ...) are carried in `extra`, so a replace sends back whatever the cluster
/// returned for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// Minimal document of the given type with just a name set.
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            metadata: Metadata {
                name: name.into(),
                ..Metadata::default()
            },
            body: Map::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    /// Top-level body entry (`spec`, `data`, ...), if present.
    pub fn body_entry(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_roundtrip_preserves_server_fields() {
        let raw = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": "ci-credentials",
                "namespace": "platform",
                "resourceVersion": "41",
                "uid": "7be1c5a7-2du9",
                "creationTimestamp": "2026-01-12T09:30:00Z"
            },
            "type": "Opaque",
            "data": { "token": "c2VjcmV0" }
        });

        let manifest: Manifest = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(manifest.name(), "ci-credentials");
        assert_eq!(manifest.namespace(), Some("platform"));
        assert_eq!(manifest.metadata.resource_version.as_deref(), Some("41"));
        assert_eq!(
            manifest.metadata.extra.get("uid"),
            Some(&json!("7be1c5a7-2du9"))
        );
        assert_eq!(manifest.body_entry("type"), Some(&json!("Opaque")));

        let back = serde_json::to_value(&manifest).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_new_builds_minimal_document() {
        let manifest = Manifest::new("v1", "ConfigMap", "app-config");
        assert_eq!(manifest.api_version, "v1");
        assert_eq!(manifest.kind, "ConfigMap");
        assert_eq!(manifest.name(), "app-config");
        assert!(manifest.namespace().is_none());
        assert!(manifest.body.is_empty());
    }

    #[test]
    fn test_missing_metadata_defaults_to_empty() {
        let manifest: Manifest =
            serde_json::from_value(json!({ "apiVersion": "v1", "kind": "ConfigMap" })).unwrap();
        assert_eq!(manifest.name(), "");
        assert!(manifest.metadata.labels.is_empty());
    }
}

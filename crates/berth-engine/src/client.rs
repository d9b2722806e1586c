//! The seam to the remote document store.

use crate::plan::WriteVerb;
use async_trait::async_trait;
use berth_core::Manifest;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Client for one named, namespaced, typed document at a time.
///
/// Idempotency and optimistic-concurrency conflicts are the remote store's
/// business; the engine only sequences calls and surfaces their errors.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Create a new object from the given document. The document carries
    /// its own namespace.
    async fn create_resource(&self, manifest: &Manifest) -> anyhow::Result<Manifest>;

    /// Replace the object named by the document within `namespace` with the
    /// desired state.
    async fn replace_resource(&self, manifest: &Manifest, namespace: &str)
    -> anyhow::Result<Manifest>;
}

/// One call the in-memory client saw, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub verb: WriteVerb,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// In-memory [`ResourceClient`] for tests and local development.
///
/// Stores documents keyed by kind/namespace/name, records every call, bumps
/// a numeric `resourceVersion` on replace, and can be told to fail writes
/// to a named object with a given message.
#[derive(Default)]
pub struct MemoryResourceClient {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<(String, String, String), Manifest>,
    calls: Vec<RecordedCall>,
    failures: BTreeMap<String, String>,
}

impl MemoryResourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object as if it already existed in the cluster.
    pub fn seed(&self, manifest: Manifest) {
        let mut inner = self.inner.lock().unwrap();
        inner.objects.insert(object_key(&manifest), manifest);
    }

    /// Make every write to the object with this name fail with `message`.
    pub fn fail_writes_to(&self, name: impl Into<String>, message: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.insert(name.into(), message.into());
    }

    /// Drop all injected failures (a "retry after the cause is fixed").
    pub fn clear_failures(&self) {
        self.inner.lock().unwrap().failures.clear();
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn get(&self, kind: &str, namespace: &str, name: &str) -> Option<Manifest> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(&(kind.to_string(), namespace.to_string(), name.to_string()))
            .cloned()
    }
}

fn object_key(manifest: &Manifest) -> (String, String, String) {
    (
        manifest.kind.clone(),
        manifest.namespace().unwrap_or_default().to_string(),
        manifest.name().to_string(),
    )
}

#[async_trait]
impl ResourceClient for MemoryResourceClient {
    async fn create_resource(&self, manifest: &Manifest) -> anyhow::Result<Manifest> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordedCall {
            verb: WriteVerb::Create,
            kind: manifest.kind.clone(),
            namespace: manifest.namespace().unwrap_or_default().to_string(),
            name: manifest.name().to_string(),
        });

        if let Some(message) = inner.failures.get(manifest.name()) {
            anyhow::bail!("{message}");
        }

        let key = object_key(manifest);
        if inner.objects.contains_key(&key) {
            anyhow::bail!("{} \"{}\" already exists", manifest.kind, manifest.name());
        }

        let mut stored = manifest.clone();
        stored.metadata.resource_version = Some("1".to_string());
        inner.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace_resource(
        &self,
        manifest: &Manifest,
        namespace: &str,
    ) -> anyhow::Result<Manifest> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordedCall {
            verb: WriteVerb::Replace,
            kind: manifest.kind.clone(),
            namespace: namespace.to_string(),
            name: manifest.name().to_string(),
        });

        if let Some(message) = inner.failures.get(manifest.name()) {
            anyhow::bail!("{message}");
        }

        let key = (
            manifest.kind.clone(),
            namespace.to_string(),
            manifest.name().to_string(),
        );
        let existing = inner.objects.get(&key).ok_or_else(|| {
            anyhow::anyhow!("{} \"{}\" not found", manifest.kind, manifest.name())
        })?;

        let next_version = existing
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;

        let mut stored = manifest.clone();
        stored.metadata.resource_version = Some(next_version.to_string());
        inner.objects.insert(key, stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespaced(kind: &str, name: &str) -> Manifest {
        let mut manifest = Manifest::new("v1", kind, name);
        manifest.metadata.namespace = Some("platform".to_string());
        manifest
    }

    #[tokio::test]
    async fn test_create_stores_and_versions_the_object() {
        let client = MemoryResourceClient::new();
        let stored = client
            .create_resource(&namespaced("Secret", "ci-credentials"))
            .await
            .unwrap();
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("1"));
        assert!(client.get("Secret", "platform", "ci-credentials").is_some());
    }

    #[tokio::test]
    async fn test_create_of_an_existing_object_fails() {
        let client = MemoryResourceClient::new();
        client.seed(namespaced("Secret", "ci-credentials"));
        let err = client
            .create_resource(&namespaced("Secret", "ci-credentials"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Secret \"ci-credentials\" already exists");
    }

    #[tokio::test]
    async fn test_replace_bumps_the_resource_version() {
        let client = MemoryResourceClient::new();
        let mut seeded = namespaced("ConfigMap", "berth-config");
        seeded.metadata.resource_version = Some("7".to_string());
        client.seed(seeded);

        let stored = client
            .replace_resource(&namespaced("ConfigMap", "berth-config"), "platform")
            .await
            .unwrap();
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("8"));
    }

    #[tokio::test]
    async fn test_replace_of_a_missing_object_fails() {
        let client = MemoryResourceClient::new();
        let err = client
            .replace_resource(&namespaced("ConfigMap", "berth-config"), "platform")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "ConfigMap \"berth-config\" not found");
    }

    #[tokio::test]
    async fn test_injected_failure_uses_the_given_message() {
        let client = MemoryResourceClient::new();
        client.fail_writes_to("ci-credentials", "admission webhook denied the request");
        let err = client
            .create_resource(&namespaced("Secret", "ci-credentials"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "admission webhook denied the request");
        assert_eq!(client.calls().len(), 1);
    }
}

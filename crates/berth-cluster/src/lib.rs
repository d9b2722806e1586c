//! Kubernetes-backed [`ResourceClient`].
//!
//! Documents are written through `Api<DynamicObject>` so one client handles
//! Secrets, ConfigMaps, ServiceAccounts and the GitServer custom resource
//! alike; the GVK comes from each manifest's `apiVersion`/`kind`.

use async_trait::async_trait;
use berth_core::Manifest;
use berth_engine::ResourceClient;
use kube::api::{Api, DynamicObject, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, GroupVersionKind};
use kube::{Client, Config};
use std::path::Path;

/// Errors while connecting to the cluster.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("failed to create cluster client: {0}")]
    ClientCreation(#[from] kube::Error),

    #[error("failed to infer cluster configuration: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("failed to read kubeconfig: {0}")]
    ReadKubeconfig(#[from] kube::config::KubeconfigError),
}

/// [`ResourceClient`] over a live cluster connection.
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
}

impl KubeResourceClient {
    /// Connect using the standard discovery chain: in-cluster service
    /// account first, then the local kubeconfig.
    pub async fn from_inferred() -> Result<Self, ClusterError> {
        let config = Config::infer().await?;
        Ok(Self {
            client: Client::try_from(config)?,
        })
    }

    /// Connect with an explicit kubeconfig file and optional context.
    pub async fn from_kubeconfig(
        path: impl AsRef<Path>,
        context: Option<&str>,
    ) -> Result<Self, ClusterError> {
        let kubeconfig = Kubeconfig::read_from(path.as_ref())?;
        let options = KubeConfigOptions {
            context: context.map(str::to_string),
            ..KubeConfigOptions::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
        Ok(Self {
            client: Client::try_from(config)?,
        })
    }

    fn api_for(&self, manifest: &Manifest, namespace: &str) -> Api<DynamicObject> {
        let gvk = manifest_gvk(manifest);
        let resource = ApiResource::from_gvk(&gvk);
        Api::namespaced_with(self.client.clone(), namespace, &resource)
    }
}

fn manifest_gvk(manifest: &Manifest) -> GroupVersionKind {
    let (group, version) = match manifest.api_version.split_once('/') {
        Some((group, version)) => (group, version),
        // Core API group, e.g. `v1`.
        None => ("", manifest.api_version.as_str()),
    };
    GroupVersionKind::gvk(group, version, &manifest.kind)
}

fn to_dynamic(manifest: &Manifest) -> anyhow::Result<DynamicObject> {
    Ok(serde_json::from_value(serde_json::to_value(manifest)?)?)
}

fn from_dynamic(object: DynamicObject) -> anyhow::Result<Manifest> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn create_resource(&self, manifest: &Manifest) -> anyhow::Result<Manifest> {
        let namespace = manifest
            .namespace()
            .unwrap_or_else(|| self.client.default_namespace());
        let api = self.api_for(manifest, namespace);
        tracing::debug!(kind = %manifest.kind, name = %manifest.name(), namespace, "creating object");
        let created = api
            .create(&PostParams::default(), &to_dynamic(manifest)?)
            .await?;
        from_dynamic(created)
    }

    async fn replace_resource(
        &self,
        manifest: &Manifest,
        namespace: &str,
    ) -> anyhow::Result<Manifest> {
        let api = self.api_for(manifest, namespace);
        tracing::debug!(kind = %manifest.kind, name = %manifest.name(), namespace, "replacing object");
        let replaced = api
            .replace(manifest.name(), &PostParams::default(), &to_dynamic(manifest)?)
            .await?;
        from_dynamic(replaced)
    }
}

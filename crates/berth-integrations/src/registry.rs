//! Container registry integration: pull/push credential `Secret`s, the
//! registry `ConfigMap`, and (for IRSA registries) the pipeline
//! `ServiceAccount`.
//!
//! Credential secrets write first, then the config map that references the
//! registry, then the service account. The secrets are secret-like; the
//! config map and service account are strict.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use berth_core::Manifest;
use berth_engine::{
    AuditSink, CurrentPolicy, DraftError, Integration, MutationError, MutationMode, Orchestrator,
    ResourceClient, SubResource,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const CONFIG_MAP_NAME: &str = "berth-config";
pub const PULL_SECRET_NAME: &str = "registry-pull-credentials";
pub const PUSH_SECRET_NAME: &str = "registry-push-credentials";
pub const SERVICE_ACCOUNT_NAME: &str = "pipeline-runner";

const DOCKER_HUB_HOST: &str = "https://index.docker.io/v1/";
const GHCR_HOST: &str = "ghcr.io";
const IRSA_ANNOTATION: &str = "eks.amazonaws.com/role-arn";

/// Supported registry types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    Harbor,
    Dockerhub,
    Nexus,
    Ghcr,
    Ecr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistryIntegrationRequest {
    pub cluster_name: String,
    pub namespace: String,
    pub mode: MutationMode,
    pub dirty_fields: RegistryDirtyFields,
    pub config_map: RegistryConfigMapInput,
    pub pull_account_secret: RegistrySecretInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_account_secret: Option<RegistrySecretInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<ServiceAccountInput>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistryDirtyFields {
    #[serde(default)]
    pub config_map: bool,
    #[serde(default)]
    pub pull_account_secret: bool,
    #[serde(default)]
    pub push_account_secret: bool,
    #[serde(default)]
    pub service_account: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistryConfigMapInput {
    pub registry_type: RegistryKind,
    pub registry_space: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_resource: Option<Manifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistrySecretInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<RegistryAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_resource: Option<Manifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceAccountInput {
    pub irsa_role_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_resource: Option<Manifest>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryIntegrationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_map: Option<Manifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_account_secret: Option<Manifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_account_secret: Option<Manifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<Manifest>,
}

/// Auths-entry host for credential secrets. ECR has no credential secrets
/// at all; Harbor and Nexus are self-hosted, so the endpoint must be given.
fn credential_host(
    key: &'static str,
    config_map: &RegistryConfigMapInput,
) -> Result<String, DraftError> {
    match config_map.registry_type {
        RegistryKind::Dockerhub => Ok(DOCKER_HUB_HOST.to_string()),
        RegistryKind::Ghcr => Ok(GHCR_HOST.to_string()),
        RegistryKind::Harbor | RegistryKind::Nexus => config_map
            .registry_endpoint
            .clone()
            .ok_or_else(|| DraftError::invalid(key, "registryEndpoint is required for this registry type")),
        RegistryKind::Ecr => Err(DraftError::invalid(
            key,
            "ecr registries authenticate through IRSA, not pull/push credentials",
        )),
    }
}

/// Host recorded in the config map. Unlike credential secrets, an ECR
/// request may carry an endpoint and it is recorded as-is; when it does
/// not, no host key is written.
fn config_map_host(config_map: &RegistryConfigMapInput) -> Result<Option<String>, DraftError> {
    match config_map.registry_type {
        RegistryKind::Dockerhub => Ok(Some(DOCKER_HUB_HOST.to_string())),
        RegistryKind::Ghcr => Ok(Some(GHCR_HOST.to_string())),
        RegistryKind::Harbor | RegistryKind::Nexus => {
            config_map.registry_endpoint.clone().map(Some).ok_or_else(|| {
                DraftError::invalid(
                    "configMap",
                    "registryEndpoint is required for this registry type",
                )
            })
        }
        RegistryKind::Ecr => Ok(config_map.registry_endpoint.clone()),
    }
}

fn dockerconfigjson(host: &str, auth: &RegistryAuth) -> String {
    let token = BASE64.encode(format!("{}:{}", auth.username, auth.password));
    json!({
        "auths": {
            host: {
                "username": auth.username,
                "password": auth.password,
                "auth": token
            }
        }
    })
    .to_string()
}

fn credential_secret_manifest(
    key: &'static str,
    name: &str,
    request: &RegistryIntegrationRequest,
    input: Option<&RegistrySecretInput>,
) -> Result<Manifest, DraftError> {
    let input = input.ok_or(DraftError::missing(key))?;
    let auth = input
        .auth
        .as_ref()
        .ok_or_else(|| DraftError::invalid(key, "registry credentials are required"))?;
    let host = credential_host(key, &request.config_map)?;

    let mut manifest = Manifest::new("v1", "Secret", name);
    manifest.metadata.namespace = Some(request.namespace.clone());
    manifest
        .body
        .insert("type".to_string(), json!("kubernetes.io/dockerconfigjson"));
    manifest.body.insert(
        "stringData".to_string(),
        json!({ ".dockerconfigjson": dockerconfigjson(&host, auth) }),
    );
    Ok(manifest)
}

fn credential_secret_edit(
    key: &'static str,
    name: &str,
    current: &Manifest,
    request: &RegistryIntegrationRequest,
    input: Option<&RegistrySecretInput>,
) -> Result<Manifest, DraftError> {
    let desired = credential_secret_manifest(key, name, request, input)?;
    let mut manifest = current.clone();
    manifest.body.remove("data");
    manifest.body.insert(
        "stringData".to_string(),
        desired.body_entry("stringData").cloned().unwrap_or(Value::Null),
    );
    Ok(manifest)
}

fn pull_secret_create_draft(request: &RegistryIntegrationRequest) -> Result<Manifest, DraftError> {
    credential_secret_manifest(
        "pullAccountSecret",
        PULL_SECRET_NAME,
        request,
        Some(&request.pull_account_secret),
    )
}

fn pull_secret_edit(
    current: &Manifest,
    request: &RegistryIntegrationRequest,
) -> Result<Manifest, DraftError> {
    credential_secret_edit(
        "pullAccountSecret",
        PULL_SECRET_NAME,
        current,
        request,
        Some(&request.pull_account_secret),
    )
}

fn push_secret_create_draft(request: &RegistryIntegrationRequest) -> Result<Manifest, DraftError> {
    credential_secret_manifest(
        "pushAccountSecret",
        PUSH_SECRET_NAME,
        request,
        request.push_account_secret.as_ref(),
    )
}

fn push_secret_edit(
    current: &Manifest,
    request: &RegistryIntegrationRequest,
) -> Result<Manifest, DraftError> {
    credential_secret_edit(
        "pushAccountSecret",
        PUSH_SECRET_NAME,
        current,
        request,
        request.push_account_secret.as_ref(),
    )
}

/// Sets the managed config map entries; other entries are left untouched by
/// the edit path.
fn managed_config_entries(
    data: &mut Map<String, Value>,
    config_map: &RegistryConfigMapInput,
) -> Result<(), DraftError> {
    let host = config_map_host(config_map)?;
    data.insert("registry_type".to_string(), json!(config_map.registry_type));
    data.insert(
        "registry_space".to_string(),
        json!(config_map.registry_space),
    );
    match host {
        Some(host) => {
            data.insert("registry_host".to_string(), json!(host));
        }
        None => {
            data.remove("registry_host");
        }
    }
    match &config_map.aws_region {
        Some(region) => {
            data.insert("aws_region".to_string(), json!(region));
        }
        None => {
            data.remove("aws_region");
        }
    }
    Ok(())
}

fn config_map_create_draft(request: &RegistryIntegrationRequest) -> Result<Manifest, DraftError> {
    let mut data = Map::new();
    managed_config_entries(&mut data, &request.config_map)?;

    let mut manifest = Manifest::new("v1", "ConfigMap", CONFIG_MAP_NAME);
    manifest.metadata.namespace = Some(request.namespace.clone());
    manifest.body.insert("data".to_string(), Value::Object(data));
    Ok(manifest)
}

fn config_map_edit(
    current: &Manifest,
    request: &RegistryIntegrationRequest,
) -> Result<Manifest, DraftError> {
    let mut manifest = current.clone();
    let mut data = match manifest.body.remove("data") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    managed_config_entries(&mut data, &request.config_map)?;
    manifest.body.insert("data".to_string(), Value::Object(data));
    Ok(manifest)
}

fn service_account_create_draft(
    request: &RegistryIntegrationRequest,
) -> Result<Manifest, DraftError> {
    let input = request
        .service_account
        .as_ref()
        .ok_or(DraftError::missing("serviceAccount"))?;

    let mut manifest = Manifest::new("v1", "ServiceAccount", SERVICE_ACCOUNT_NAME);
    manifest.metadata.namespace = Some(request.namespace.clone());
    manifest
        .metadata
        .annotations
        .insert(IRSA_ANNOTATION.to_string(), input.irsa_role_arn.clone());
    Ok(manifest)
}

fn service_account_edit(
    current: &Manifest,
    request: &RegistryIntegrationRequest,
) -> Result<Manifest, DraftError> {
    let input = request
        .service_account
        .as_ref()
        .ok_or(DraftError::missing("serviceAccount"))?;

    // Only the role annotation is managed; image pull secrets, tokens and
    // everything else stay as the cluster returned them.
    let mut manifest = current.clone();
    manifest
        .metadata
        .annotations
        .insert(IRSA_ANNOTATION.to_string(), input.irsa_role_arn.clone());
    Ok(manifest)
}

static DESCRIPTORS: &[SubResource<RegistryIntegrationRequest>] = &[
    SubResource {
        key: "pullAccountSecret",
        kind: "Secret",
        order: 0,
        current_policy: CurrentPolicy::CreateIfMissing,
        dirty: |r| r.dirty_fields.pull_account_secret,
        current: |r| r.pull_account_secret.current_resource.as_ref(),
        create_draft: pull_secret_create_draft,
        edit: pull_secret_edit,
    },
    SubResource {
        key: "pushAccountSecret",
        kind: "Secret",
        order: 1,
        current_policy: CurrentPolicy::CreateIfMissing,
        dirty: |r| r.dirty_fields.push_account_secret,
        current: |r| {
            r.push_account_secret
                .as_ref()
                .and_then(|input| input.current_resource.as_ref())
        },
        create_draft: push_secret_create_draft,
        edit: push_secret_edit,
    },
    SubResource {
        key: "configMap",
        kind: "ConfigMap",
        order: 2,
        current_policy: CurrentPolicy::Strict,
        dirty: |r| r.dirty_fields.config_map,
        current: |r| r.config_map.current_resource.as_ref(),
        create_draft: config_map_create_draft,
        edit: config_map_edit,
    },
    SubResource {
        key: "serviceAccount",
        kind: "ServiceAccount",
        order: 3,
        current_policy: CurrentPolicy::Strict,
        dirty: |r| r.dirty_fields.service_account,
        current: |r| {
            r.service_account
                .as_ref()
                .and_then(|input| input.current_resource.as_ref())
        },
        create_draft: service_account_create_draft,
        edit: service_account_edit,
    },
];

pub struct RegistryIntegration;

impl Integration for RegistryIntegration {
    type Request = RegistryIntegrationRequest;
    const NAME: &'static str = "registry";

    fn descriptors() -> &'static [SubResource<Self::Request>] {
        DESCRIPTORS
    }
}

/// Write the registry integration's objects in descriptor order,
/// create-vs-replace decided per dirty sub-resource.
pub async fn manage_registry_integration<C: ResourceClient, A: AuditSink>(
    orchestrator: &Orchestrator<C, A>,
    request: &RegistryIntegrationRequest,
) -> Result<RegistryIntegrationResult, MutationError> {
    let mut applied = orchestrator
        .run::<RegistryIntegration>(&request.namespace, request.mode, request)
        .await?;
    Ok(RegistryIntegrationResult {
        config_map: applied.remove("configMap"),
        pull_account_secret: applied.remove("pullAccountSecret"),
        push_account_secret: applied.remove("pushAccountSecret"),
        service_account: applied.remove("serviceAccount"),
    })
}

//! Git server integration: a `GitServer` custom resource plus one
//! credential `Secret`.
//!
//! The secret is written first so the GitServer object never references a
//! credential that does not exist yet. The secret is secret-like (it may be
//! introduced during an otherwise-edit flow, e.g. when credentials are set
//! for the first time); the GitServer object itself is strict.

use berth_core::Manifest;
use berth_engine::{
    AuditSink, CurrentPolicy, DraftError, Integration, MutationError, MutationMode, Orchestrator,
    ResourceClient, SubResource,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const GIT_SERVER_API_VERSION: &str = "platform.berth.dev/v1alpha1";

/// Supported git providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProvider {
    Gerrit,
    Github,
    Gitlab,
    Bitbucket,
}

/// Credential shape per provider. Gerrit authenticates with an SSH keypair;
/// the token providers use an access token plus an optional SSH private key
/// for clone-over-SSH setups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "gitProvider",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum GitCredentials {
    Gerrit {
        ssh_private_key: String,
        ssh_public_key: String,
    },
    Github {
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ssh_private_key: Option<String>,
    },
    Gitlab {
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ssh_private_key: Option<String>,
    },
    Bitbucket {
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ssh_private_key: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GitServerIntegrationRequest {
    pub cluster_name: String,
    pub namespace: String,
    pub mode: MutationMode,
    pub dirty_fields: GitServerDirtyFields,
    pub git_server: GitServerInput,
    pub secret: GitSecretInput,
}

/// Exhaustively keyed: an unrecognized key fails deserialization instead of
/// being silently ignored.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GitServerDirtyFields {
    #[serde(default)]
    pub git_server: bool,
    #[serde(default)]
    pub secret: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GitServerInput {
    pub name: String,
    pub git_host: String,
    pub git_provider: GitProvider,
    pub git_user: String,
    pub name_ssh_key_secret: String,
    pub ssh_port: u16,
    pub https_port: u16,
    #[serde(rename = "skipWebhookSSLVerification")]
    pub skip_webhook_ssl_verification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_resource: Option<Manifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GitSecretInput {
    pub credentials: GitCredentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_resource: Option<Manifest>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitServerIntegrationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<Manifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_server: Option<Manifest>,
}

fn credential_string_data(request: &GitServerIntegrationRequest) -> Value {
    let mut data = Map::new();
    data.insert("username".to_string(), json!(request.git_server.git_user));
    match &request.secret.credentials {
        GitCredentials::Gerrit {
            ssh_private_key,
            ssh_public_key,
        } => {
            data.insert("id_rsa".to_string(), json!(ssh_private_key));
            data.insert("id_rsa.pub".to_string(), json!(ssh_public_key));
        }
        GitCredentials::Github {
            token,
            ssh_private_key,
        }
        | GitCredentials::Gitlab {
            token,
            ssh_private_key,
        }
        | GitCredentials::Bitbucket {
            token,
            ssh_private_key,
        } => {
            data.insert("token".to_string(), json!(token));
            if let Some(key) = ssh_private_key {
                data.insert("id_rsa".to_string(), json!(key));
            }
        }
    }
    Value::Object(data)
}

fn secret_create_draft(request: &GitServerIntegrationRequest) -> Result<Manifest, DraftError> {
    let mut manifest = Manifest::new("v1", "Secret", &request.git_server.name_ssh_key_secret);
    manifest.metadata.namespace = Some(request.namespace.clone());
    manifest.body.insert("type".to_string(), json!("Opaque"));
    manifest
        .body
        .insert("stringData".to_string(), credential_string_data(request));
    Ok(manifest)
}

fn secret_edit(
    current: &Manifest,
    request: &GitServerIntegrationRequest,
) -> Result<Manifest, DraftError> {
    let mut manifest = current.clone();
    // Stale base64 entries in `data` would survive the server-side
    // stringData merge, so drop them and send the full desired set.
    manifest.body.remove("data");
    manifest
        .body
        .insert("stringData".to_string(), credential_string_data(request));
    Ok(manifest)
}

fn git_server_spec(input: &GitServerInput) -> Value {
    let mut spec = json!({
        "gitHost": input.git_host,
        "gitProvider": input.git_provider,
        "gitUser": input.git_user,
        "httpsPort": input.https_port,
        "nameSshKeySecret": input.name_ssh_key_secret,
        "sshPort": input.ssh_port,
        "skipWebhookSSLVerification": input.skip_webhook_ssl_verification,
    });
    if let Some(url) = &input.webhook_url {
        spec["webhookUrl"] = json!(url);
    }
    spec
}

fn git_server_create_draft(request: &GitServerIntegrationRequest) -> Result<Manifest, DraftError> {
    let mut manifest = Manifest::new(GIT_SERVER_API_VERSION, "GitServer", &request.git_server.name);
    manifest.metadata.namespace = Some(request.namespace.clone());
    manifest
        .body
        .insert("spec".to_string(), git_server_spec(&request.git_server));
    Ok(manifest)
}

fn git_server_edit(
    current: &Manifest,
    request: &GitServerIntegrationRequest,
) -> Result<Manifest, DraftError> {
    let mut manifest = current.clone();
    manifest
        .body
        .insert("spec".to_string(), git_server_spec(&request.git_server));
    Ok(manifest)
}

static DESCRIPTORS: &[SubResource<GitServerIntegrationRequest>] = &[
    SubResource {
        key: "secret",
        kind: "Secret",
        order: 0,
        current_policy: CurrentPolicy::CreateIfMissing,
        dirty: |r| r.dirty_fields.secret,
        current: |r| r.secret.current_resource.as_ref(),
        create_draft: secret_create_draft,
        edit: secret_edit,
    },
    SubResource {
        key: "gitServer",
        kind: "GitServer",
        order: 1,
        current_policy: CurrentPolicy::Strict,
        dirty: |r| r.dirty_fields.git_server,
        current: |r| r.git_server.current_resource.as_ref(),
        create_draft: git_server_create_draft,
        edit: git_server_edit,
    },
];

pub struct GitServerIntegration;

impl Integration for GitServerIntegration {
    type Request = GitServerIntegrationRequest;
    const NAME: &'static str = "gitServer";

    fn descriptors() -> &'static [SubResource<Self::Request>] {
        DESCRIPTORS
    }
}

/// Write the Git server integration's objects in descriptor order,
/// create-vs-replace decided per dirty sub-resource.
pub async fn manage_git_server_integration<C: ResourceClient, A: AuditSink>(
    orchestrator: &Orchestrator<C, A>,
    request: &GitServerIntegrationRequest,
) -> Result<GitServerIntegrationResult, MutationError> {
    let mut applied = orchestrator
        .run::<GitServerIntegration>(&request.namespace, request.mode, request)
        .await?;
    Ok(GitServerIntegrationResult {
        secret: applied.remove("secret"),
        git_server: applied.remove("gitServer"),
    })
}

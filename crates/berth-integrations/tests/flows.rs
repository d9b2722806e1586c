//! End-to-end integration flows against the in-memory resource client.

use berth_core::Manifest;
use berth_engine::{
    MemoryAuditSink, MemoryResourceClient, MutationError, MutationMode, Orchestrator, WriteOutcome,
    WriteVerb,
};
use berth_integrations::git_server::{
    GitCredentials, GitProvider, GitSecretInput, GitServerDirtyFields, GitServerInput,
    GitServerIntegrationRequest, manage_git_server_integration,
};
use berth_integrations::registry::{
    RegistryAuth, RegistryConfigMapInput, RegistryDirtyFields, RegistryIntegrationRequest,
    RegistryKind, RegistrySecretInput, ServiceAccountInput, manage_registry_integration,
};
use serde_json::json;

fn orchestrator() -> Orchestrator<MemoryResourceClient, MemoryAuditSink> {
    Orchestrator::new(MemoryResourceClient::new(), MemoryAuditSink::new())
}

fn github_request(mode: MutationMode) -> GitServerIntegrationRequest {
    GitServerIntegrationRequest {
        cluster_name: "core".to_string(),
        namespace: "platform".to_string(),
        mode,
        dirty_fields: GitServerDirtyFields {
            git_server: true,
            secret: true,
        },
        git_server: GitServerInput {
            name: "github".to_string(),
            git_host: "github.com".to_string(),
            git_provider: GitProvider::Github,
            git_user: "git".to_string(),
            name_ssh_key_secret: "ci-github".to_string(),
            ssh_port: 22,
            https_port: 443,
            skip_webhook_ssl_verification: false,
            webhook_url: None,
            current_resource: None,
        },
        secret: GitSecretInput {
            credentials: GitCredentials::Github {
                token: "ghp_abc".to_string(),
                ssh_private_key: None,
            },
            current_resource: None,
        },
    }
}

fn harbor_request(mode: MutationMode) -> RegistryIntegrationRequest {
    RegistryIntegrationRequest {
        cluster_name: "core".to_string(),
        namespace: "platform".to_string(),
        mode,
        dirty_fields: RegistryDirtyFields::default(),
        config_map: RegistryConfigMapInput {
            registry_type: RegistryKind::Harbor,
            registry_space: "platform-images".to_string(),
            registry_endpoint: Some("harbor.example.com".to_string()),
            aws_region: None,
            current_resource: None,
        },
        pull_account_secret: RegistrySecretInput {
            auth: Some(RegistryAuth {
                username: "puller".to_string(),
                password: "hunter2".to_string(),
            }),
            current_resource: None,
        },
        push_account_secret: Some(RegistrySecretInput {
            auth: Some(RegistryAuth {
                username: "pusher".to_string(),
                password: "hunter3".to_string(),
            }),
            current_resource: None,
        }),
        service_account: None,
    }
}

fn stored_manifest(kind: &str, name: &str, resource_version: &str) -> Manifest {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": kind,
        "metadata": { "name": name, "namespace": "platform", "resourceVersion": resource_version }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_git_server_create_writes_secret_before_git_server() {
    let orchestrator = orchestrator();
    let request = github_request(MutationMode::Create);

    let result = manage_git_server_integration(&orchestrator, &request)
        .await
        .unwrap();

    let calls = orchestrator.client().calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].verb, WriteVerb::Create);
    assert_eq!(calls[0].kind, "Secret");
    assert_eq!(calls[1].verb, WriteVerb::Create);
    assert_eq!(calls[1].kind, "GitServer");

    assert!(result.secret.is_some());
    assert!(result.git_server.is_some());
}

#[tokio::test]
async fn test_git_server_edit_with_only_secret_dirty_replaces_one_object() {
    let orchestrator = orchestrator();
    let current = stored_manifest("Secret", "ci-github", "5");
    orchestrator.client().seed(current.clone());

    let mut request = github_request(MutationMode::Edit);
    request.dirty_fields.git_server = false;
    request.secret.current_resource = Some(current);

    let result = manage_git_server_integration(&orchestrator, &request)
        .await
        .unwrap();

    let calls = orchestrator.client().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].verb, WriteVerb::Replace);
    assert_eq!(calls[0].name, "ci-github");

    assert!(result.secret.is_some());
    assert!(result.git_server.is_none());
}

#[tokio::test]
async fn test_git_server_edit_without_current_fails_before_any_write() {
    let orchestrator = orchestrator();
    let mut request = github_request(MutationMode::Edit);
    request.dirty_fields.secret = false;
    // gitServer is dirty but carries no snapshot: strict precondition.

    let err = manage_git_server_integration(&orchestrator, &request)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "currentResource is required for gitServer in edit mode"
    );
    assert!(orchestrator.client().calls().is_empty());
}

#[tokio::test]
async fn test_git_secret_introduced_during_edit_is_created() {
    let orchestrator = orchestrator();
    let current = stored_manifest("GitServer", "github", "2");
    orchestrator.client().seed(current.clone());

    let mut request = github_request(MutationMode::Edit);
    request.git_server.current_resource = Some(current);
    // Secret is dirty with no snapshot: it does not exist yet.

    let result = manage_git_server_integration(&orchestrator, &request)
        .await
        .unwrap();

    let calls = orchestrator.client().calls();
    assert_eq!(calls[0].verb, WriteVerb::Create);
    assert_eq!(calls[0].kind, "Secret");
    assert_eq!(calls[1].verb, WriteVerb::Replace);
    assert_eq!(calls[1].kind, "GitServer");
    assert!(result.secret.is_some());
}

#[tokio::test]
async fn test_nothing_dirty_makes_no_calls_and_returns_no_keys() {
    let orchestrator = orchestrator();
    let mut request = harbor_request(MutationMode::Edit);
    request.dirty_fields = RegistryDirtyFields::default();

    let result = manage_registry_integration(&orchestrator, &request)
        .await
        .unwrap();

    assert!(orchestrator.client().calls().is_empty());
    assert!(result.config_map.is_none());
    assert!(result.pull_account_secret.is_none());
    assert!(result.push_account_secret.is_none());
    assert!(result.service_account.is_none());
}

#[tokio::test]
async fn test_ecr_service_account_edit_without_current_is_rejected() {
    let orchestrator = orchestrator();
    let mut request = harbor_request(MutationMode::Edit);
    request.config_map.registry_type = RegistryKind::Ecr;
    request.dirty_fields.service_account = true;
    request.service_account = Some(ServiceAccountInput {
        irsa_role_arn: "arn:aws:iam::1234:role/pipelines".to_string(),
        current_resource: None,
    });

    let err = manage_registry_integration(&orchestrator, &request)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "currentResource is required for serviceAccount in edit mode"
    );
    assert!(orchestrator.client().calls().is_empty());
}

#[tokio::test]
async fn test_registry_edit_replaces_three_objects_in_declared_order() {
    let orchestrator = orchestrator();
    let pull = stored_manifest("Secret", "registry-pull-credentials", "4");
    let push = stored_manifest("Secret", "registry-push-credentials", "4");
    let config_map = stored_manifest("ConfigMap", "berth-config", "11");
    for manifest in [&pull, &push, &config_map] {
        orchestrator.client().seed(manifest.clone());
    }

    let mut request = harbor_request(MutationMode::Edit);
    request.dirty_fields.config_map = true;
    request.dirty_fields.pull_account_secret = true;
    request.dirty_fields.push_account_secret = true;
    request.config_map.current_resource = Some(config_map);
    request.pull_account_secret.current_resource = Some(pull);
    request.push_account_secret.as_mut().unwrap().current_resource = Some(push);

    let result = manage_registry_integration(&orchestrator, &request)
        .await
        .unwrap();

    let names: Vec<_> = orchestrator
        .client()
        .calls()
        .into_iter()
        .map(|call| (call.verb, call.name))
        .collect();
    assert_eq!(
        names,
        vec![
            (WriteVerb::Replace, "registry-pull-credentials".to_string()),
            (WriteVerb::Replace, "registry-push-credentials".to_string()),
            (WriteVerb::Replace, "berth-config".to_string()),
        ]
    );

    assert!(result.config_map.is_some());
    assert!(result.pull_account_secret.is_some());
    assert!(result.push_account_secret.is_some());
}

#[tokio::test]
async fn test_failure_mid_plan_surfaces_the_remote_error_and_partial_state() {
    let orchestrator = orchestrator();
    orchestrator
        .client()
        .fail_writes_to("registry-push-credentials", "secrets \"registry-push-credentials\" is forbidden");

    let mut request = harbor_request(MutationMode::Create);
    request.dirty_fields.config_map = true;
    request.dirty_fields.pull_account_secret = true;
    request.dirty_fields.push_account_secret = true;

    let err = manage_registry_integration(&orchestrator, &request)
        .await
        .unwrap_err();

    // First write landed, second failed, third never attempted.
    assert_eq!(orchestrator.client().calls().len(), 2);
    assert_eq!(
        err.to_string(),
        "secrets \"registry-push-credentials\" is forbidden"
    );
    match err {
        MutationError::Write { key, committed, .. } => {
            assert_eq!(key, "pushAccountSecret");
            assert_eq!(committed, vec!["pullAccountSecret"]);
        }
        other => panic!("expected a write error, got {other:?}"),
    }

    // The pull secret stays applied; the audit trail has both attempts.
    assert!(
        orchestrator
            .client()
            .get("Secret", "platform", "registry-pull-credentials")
            .is_some()
    );
    let records = orchestrator.audit().records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].outcome, WriteOutcome::Applied);
    assert!(matches!(records[1].outcome, WriteOutcome::Failed(_)));
}

#[tokio::test]
async fn test_retrying_an_edit_after_the_cause_is_fixed_completes_the_rest() {
    let orchestrator = orchestrator();
    let pull = stored_manifest("Secret", "registry-pull-credentials", "4");
    let config_map = stored_manifest("ConfigMap", "berth-config", "11");
    orchestrator.client().seed(pull.clone());
    orchestrator.client().seed(config_map.clone());
    orchestrator
        .client()
        .fail_writes_to("berth-config", "admission webhook denied the request");

    let mut request = harbor_request(MutationMode::Edit);
    request.dirty_fields.config_map = true;
    request.dirty_fields.pull_account_secret = true;
    request.pull_account_secret.current_resource = Some(pull);
    request.config_map.current_resource = Some(config_map);

    let err = manage_registry_integration(&orchestrator, &request)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "admission webhook denied the request");

    // Same request again once the webhook stops interfering: the pull
    // secret replace re-applies the same desired state, the config map
    // write completes.
    orchestrator.client().clear_failures();
    let result = manage_registry_integration(&orchestrator, &request)
        .await
        .unwrap();
    assert!(result.pull_account_secret.is_some());
    assert!(result.config_map.is_some());
    assert_eq!(orchestrator.client().calls().len(), 4);
}

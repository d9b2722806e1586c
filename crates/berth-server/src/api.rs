//! The procedure API: one POST route per integration type.
//!
//! Responses use a `{"success": ..., ...}` envelope. Remote errors pass
//! through with their original message so the UI can show them verbatim.

use crate::state::AppState;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use berth_engine::MutationError;
use berth_integrations::{
    GitServerIntegrationRequest, RegistryIntegrationRequest, manage_git_server_integration,
    manage_registry_integration,
};
use serde_json::{Value, json};
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/integrations/git-server", post(git_server))
        .route("/api/v1/integrations/registry", post(registry))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true, "service": "berth-server" }))
}

async fn git_server(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GitServerIntegrationRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    check_cluster(&state, &request.cluster_name)?;
    let result = manage_git_server_integration(&state.orchestrator, &request).await?;
    Ok(Json(json!({ "success": true, "data": result })))
}

async fn registry(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RegistryIntegrationRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    check_cluster(&state, &request.cluster_name)?;
    let result = manage_registry_integration(&state.orchestrator, &request).await?;
    Ok(Json(json!({ "success": true, "data": result })))
}

fn check_cluster(state: &AppState, requested: &str) -> Result<(), ApiError> {
    if requested == state.cluster_name {
        Ok(())
    } else {
        Err(ApiError::ClusterMismatch {
            requested: requested.to_string(),
            configured: state.cluster_name.clone(),
        })
    }
}

#[derive(Debug)]
pub enum ApiError {
    ClusterMismatch { requested: String, configured: String },
    InvalidBody { status: StatusCode, message: String },
    Mutation(MutationError),
}

impl From<MutationError> for ApiError {
    fn from(err: MutationError) -> Self {
        Self::Mutation(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::ClusterMismatch { .. } => StatusCode::BAD_REQUEST,
            ApiError::InvalidBody { status, .. } => *status,
            // Precondition failures happen before any write; remote write
            // failures mean the cluster rejected or dropped the call.
            ApiError::Mutation(MutationError::Write { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Mutation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::ClusterMismatch {
                requested,
                configured,
            } => format!(
                "request addresses cluster \"{requested}\" but this console manages \"{configured}\""
            ),
            ApiError::InvalidBody { message, .. } => message.clone(),
            ApiError::Mutation(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "success": false, "error": self.message() }));
        (status, body).into_response()
    }
}

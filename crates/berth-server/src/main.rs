mod api;
mod state;

use berth_cluster::KubeResourceClient;
use berth_core::ConsoleConfig;
use berth_engine::{Orchestrator, TracingAuditSink};
use state::AppState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "berth.yaml".to_string());
    let config = ConsoleConfig::from_file(&config_path)?;

    let client = match &config.cluster.kubeconfig {
        Some(path) => {
            KubeResourceClient::from_kubeconfig(path, config.cluster.context.as_deref()).await?
        }
        None => KubeResourceClient::from_inferred().await?,
    };

    let state = Arc::new(AppState {
        cluster_name: config.cluster.name.clone(),
        orchestrator: Orchestrator::new(client, TracingAuditSink),
    });

    let app = api::router(state).layer(TraceLayer::new_for_http());

    let addr = &config.server.listen_addr;
    tracing::info!(cluster = %config.cluster.name, "berth-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

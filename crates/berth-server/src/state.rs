use berth_cluster::KubeResourceClient;
use berth_engine::{Orchestrator, TracingAuditSink};

/// Shared handler state: the engine plus the one cluster name this
/// deployment answers for.
pub struct AppState {
    pub cluster_name: String,
    pub orchestrator: Orchestrator<KubeResourceClient, TracingAuditSink>,
}

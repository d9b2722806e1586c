//! Per-write audit trail.
//!
//! With no rollback, the record of which writes landed before a failure is
//! the operator's only ground truth. Every attempted write produces one
//! [`WriteRecord`] regardless of outcome.

use crate::plan::WriteVerb;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOutcome {
    Applied,
    Failed(String),
}

/// One attempted write within one mutation.
#[derive(Debug, Clone, Serialize)]
pub struct WriteRecord {
    /// Groups the records of one request; fresh per invocation.
    pub mutation_id: Uuid,
    pub integration: &'static str,
    pub key: &'static str,
    pub verb: WriteVerb,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub outcome: WriteOutcome,
    pub at: DateTime<Utc>,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, record: WriteRecord);
}

/// Emits each record as a structured tracing event. The default sink in the
/// server and CLI binaries.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: WriteRecord) {
        match &record.outcome {
            WriteOutcome::Applied => tracing::info!(
                mutation_id = %record.mutation_id,
                integration = record.integration,
                key = record.key,
                verb = %record.verb,
                kind = %record.kind,
                name = %record.name,
                namespace = %record.namespace,
                "write applied"
            ),
            WriteOutcome::Failed(message) => tracing::warn!(
                mutation_id = %record.mutation_id,
                integration = record.integration,
                key = record.key,
                verb = %record.verb,
                kind = %record.kind,
                name = %record.name,
                namespace = %record.namespace,
                error = %message,
                "write failed"
            ),
        }
    }
}

/// Collects records in memory, for tests and introspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<WriteRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<WriteRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: WriteRecord) {
        self.records.lock().unwrap().push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_records_in_arrival_order() {
        let sink = MemoryAuditSink::new();
        let mutation_id = Uuid::new_v4();
        for (key, outcome) in [
            ("secret", WriteOutcome::Applied),
            ("gitServer", WriteOutcome::Failed("boom".to_string())),
        ] {
            sink.record(WriteRecord {
                mutation_id,
                integration: "gitServer",
                key,
                verb: WriteVerb::Create,
                kind: "Secret".to_string(),
                name: "ci-credentials".to_string(),
                namespace: "platform".to_string(),
                outcome,
                at: Utc::now(),
            });
        }

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "secret");
        assert_eq!(records[1].outcome, WriteOutcome::Failed("boom".to_string()));
    }
}

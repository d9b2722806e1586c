//! Sequential plan execution.

use crate::audit::{AuditSink, WriteOutcome, WriteRecord};
use crate::client::ResourceClient;
use crate::descriptor::Integration;
use crate::error::MutationError;
use crate::plan::{MutationMode, MutationPlan, WriteVerb, build_plan};
use berth_core::Manifest;
use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

/// The documents the store returned, one entry per key that had a queued
/// write. Consumers key by name, not position.
pub type Applied = BTreeMap<&'static str, Manifest>;

/// Runs mutation plans one write at a time against a [`ResourceClient`].
///
/// Writes execute strictly in plan order, each awaited before the next
/// starts. The first failure stops the run; writes that already landed stay
/// applied remotely (no compensation) and are listed on the error.
pub struct Orchestrator<C: ResourceClient, A: AuditSink> {
    client: C,
    audit: A,
}

impl<C: ResourceClient, A: AuditSink> Orchestrator<C, A> {
    pub fn new(client: C, audit: A) -> Self {
        Self { client, audit }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    /// Plan and execute one integration request end-to-end.
    pub async fn run<I: Integration>(
        &self,
        namespace: &str,
        mode: MutationMode,
        request: &I::Request,
    ) -> Result<Applied, MutationError> {
        let plan = build_plan(I::descriptors(), mode, request)?;
        tracing::debug!(
            integration = I::NAME,
            namespace,
            writes = plan.len(),
            "mutation plan built"
        );
        self.execute(I::NAME, namespace, plan).await
    }

    /// Execute an already-built plan.
    pub async fn execute(
        &self,
        integration: &'static str,
        namespace: &str,
        plan: MutationPlan,
    ) -> Result<Applied, MutationError> {
        let mutation_id = Uuid::new_v4();
        let mut applied = Applied::new();
        let mut committed: Vec<&'static str> = Vec::new();

        for write in plan.into_writes() {
            let outcome = match write.verb {
                WriteVerb::Create => self.client.create_resource(&write.manifest).await,
                WriteVerb::Replace => {
                    self.client.replace_resource(&write.manifest, namespace).await
                }
            };

            match outcome {
                Ok(stored) => {
                    self.audit.record(WriteRecord {
                        mutation_id,
                        integration,
                        key: write.key,
                        verb: write.verb,
                        kind: write.manifest.kind.clone(),
                        name: write.manifest.name().to_string(),
                        namespace: namespace.to_string(),
                        outcome: WriteOutcome::Applied,
                        at: Utc::now(),
                    });
                    committed.push(write.key);
                    applied.insert(write.key, stored);
                }
                Err(remote) => {
                    self.audit.record(WriteRecord {
                        mutation_id,
                        integration,
                        key: write.key,
                        verb: write.verb,
                        kind: write.manifest.kind.clone(),
                        name: write.manifest.name().to_string(),
                        namespace: namespace.to_string(),
                        outcome: WriteOutcome::Failed(remote.to_string()),
                        at: Utc::now(),
                    });
                    return Err(MutationError::Write {
                        key: write.key,
                        verb: write.verb,
                        committed,
                        remote,
                    });
                }
            }
        }

        Ok(applied)
    }
}

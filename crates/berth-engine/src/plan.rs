//! Mutation plan building.
//!
//! The plan is fully determined before any write happens: there is no
//! write-then-decide. [`build_plan`] is pure given the request and the
//! descriptor table, which keeps the whole precondition story synchronous
//! and side-effect free.

use crate::descriptor::{CurrentPolicy, SubResource};
use crate::error::MutationError;
use berth_core::Manifest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the integration as a whole is being set up or changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationMode {
    Create,
    Edit,
}

/// The remote primitive one pending write maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteVerb {
    Create,
    Replace,
}

impl fmt::Display for WriteVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteVerb::Create => f.write_str("create"),
            WriteVerb::Replace => f.write_str("replace"),
        }
    }
}

/// One queued write: the desired document plus how to send it.
#[derive(Debug, Clone, Serialize)]
pub struct PendingWrite {
    pub key: &'static str,
    pub kind: &'static str,
    pub verb: WriteVerb,
    pub manifest: Manifest,
}

/// The ordered, validated list of writes for one request. Built once,
/// consumed exactly once by the orchestrator.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct MutationPlan {
    writes: Vec<PendingWrite>,
}

impl MutationPlan {
    /// Assemble a plan from pre-built writes. [`build_plan`] is the normal
    /// entry point; this exists for fixtures and tooling.
    pub fn from_writes(writes: Vec<PendingWrite>) -> Self {
        Self { writes }
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn writes(&self) -> &[PendingWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<PendingWrite> {
        self.writes
    }
}

/// Turn one request into an ordered plan, failing before any remote call
/// when a precondition does not hold.
///
/// Descriptors are visited in ascending `order` (the table's declaration
/// order does not matter). Per dirty descriptor:
///
/// - create mode queues a create draft; any current snapshot on the input
///   is ignored;
/// - edit mode with a snapshot queues a replace of the edited document;
/// - edit mode without a snapshot queues a create for
///   [`CurrentPolicy::CreateIfMissing`] descriptors and fails the whole
///   plan for [`CurrentPolicy::Strict`] ones.
pub fn build_plan<R>(
    descriptors: &[SubResource<R>],
    mode: MutationMode,
    request: &R,
) -> Result<MutationPlan, MutationError> {
    let mut ordered: Vec<&SubResource<R>> = descriptors.iter().collect();
    ordered.sort_by_key(|d| d.order);

    let mut writes = Vec::new();
    for descriptor in ordered {
        if !(descriptor.dirty)(request) {
            continue;
        }

        let (verb, manifest) = match mode {
            MutationMode::Create => (WriteVerb::Create, (descriptor.create_draft)(request)?),
            MutationMode::Edit => match (descriptor.current)(request) {
                Some(current) => (WriteVerb::Replace, (descriptor.edit)(current, request)?),
                None => match descriptor.current_policy {
                    CurrentPolicy::CreateIfMissing => {
                        (WriteVerb::Create, (descriptor.create_draft)(request)?)
                    }
                    CurrentPolicy::Strict => {
                        return Err(MutationError::MissingCurrent {
                            key: descriptor.key,
                        });
                    }
                },
            },
        };

        writes.push(PendingWrite {
            key: descriptor.key,
            kind: descriptor.kind,
            verb,
            manifest,
        });
    }

    Ok(MutationPlan { writes })
}

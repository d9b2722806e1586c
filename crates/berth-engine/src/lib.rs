//! The generic multi-resource mutation engine.
//!
//! One integration ("manage Git server", "manage registry") touches several
//! cluster objects that should change together, but the cluster API only
//! offers single-object writes. The engine splits each request into two
//! phases:
//!
//! 1. [`build_plan`] turns the request into an ordered [`MutationPlan`]
//!    without any remote call, failing early when a precondition does not
//!    hold;
//! 2. the [`Orchestrator`] executes the plan one write at a time, stops at
//!    the first failure, and records every attempt through an [`AuditSink`].
//!
//! There is no rollback. Writes that landed before a failure stay applied;
//! the error reports which ones so the caller can phrase a retry hint.

pub mod audit;
pub mod client;
pub mod descriptor;
pub mod error;
pub mod orchestrator;
pub mod plan;

pub use audit::{AuditSink, MemoryAuditSink, TracingAuditSink, WriteOutcome, WriteRecord};
pub use client::{MemoryResourceClient, RecordedCall, ResourceClient};
pub use descriptor::{CurrentPolicy, Integration, SubResource};
pub use error::{DraftError, MutationError};
pub use orchestrator::{Applied, Orchestrator};
pub use plan::{MutationMode, MutationPlan, PendingWrite, WriteVerb, build_plan};

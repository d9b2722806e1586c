//! Error types for plan building and execution.

use crate::plan::WriteVerb;
use thiserror::Error;

/// A builder rejected its input while the plan was being assembled.
///
/// These surface before any remote call, so they carry the zero-side-effect
/// guarantee of the planning phase.
#[derive(Debug, Error)]
pub enum DraftError {
    /// A sub-resource is marked dirty but its input payload is absent.
    #[error("no input payload for {key}")]
    MissingInput { key: &'static str },

    /// The payload is present but unusable (e.g. a Harbor registry without
    /// an endpoint).
    #[error("invalid input for {key}: {reason}")]
    InvalidInput { key: &'static str, reason: String },
}

impl DraftError {
    pub fn missing(key: &'static str) -> Self {
        Self::MissingInput { key }
    }

    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            key,
            reason: reason.into(),
        }
    }
}

/// Failure of one integration mutation, either during planning (no writes
/// issued) or during execution (earlier writes stay applied).
#[derive(Debug, Error)]
pub enum MutationError {
    /// A strict sub-resource is dirty in edit mode but carries no current
    /// snapshot. Raised during planning; zero writes.
    #[error("currentResource is required for {key} in edit mode")]
    MissingCurrent { key: &'static str },

    /// A builder rejected its input. Raised during planning; zero writes.
    #[error(transparent)]
    Draft(#[from] DraftError),

    /// A remote write failed. Display is the remote error's own message so
    /// the caller can show it verbatim; `committed` lists the keys whose
    /// writes already landed (they are not rolled back).
    #[error("{remote}")]
    Write {
        key: &'static str,
        verb: WriteVerb,
        committed: Vec<&'static str>,
        remote: anyhow::Error,
    },
}

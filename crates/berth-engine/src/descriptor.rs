//! Static sub-resource descriptors.
//!
//! Each integration type declares one [`SubResource`] per cluster object it
//! manages. The tables are `'static`: write order, the strict/secret-like
//! policy, and the builder functions are fixed at configuration time, never
//! computed per request, so repeated requests with the same dirty set always
//! write in the same sequence.

use crate::error::DraftError;
use berth_core::Manifest;

/// How a sub-resource treats a missing `currentResource` in edit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentPolicy {
    /// The object must already exist: editing without a current snapshot is
    /// a precondition failure that aborts the whole request before any
    /// write. Used for the primary typed resources (GitServer, ConfigMap,
    /// ServiceAccount).
    Strict,

    /// The object may legitimately not exist yet (a credential secret
    /// introduced for the first time during an otherwise-edit flow): a
    /// missing snapshot downgrades the write to a create.
    CreateIfMissing,
}

/// One independently-writable cluster object within an integration.
///
/// Builder functions take the whole request so they can read sibling
/// payloads (a secret's name, for instance, lives on the git-server input);
/// they stay pure functions of it. Plain `fn` pointers keep the descriptor
/// tables in `static`s.
pub struct SubResource<R> {
    /// Logical name, also the key in the result map (`gitServer`, `secret`,
    /// `configMap`, `pullAccountSecret`, `pushAccountSecret`,
    /// `serviceAccount`).
    pub key: &'static str,

    /// The underlying document type (`Secret`, `ConfigMap`, ...).
    pub kind: &'static str,

    /// Write sequence within one request; lower runs first. Unique per
    /// integration type.
    pub order: u32,

    pub current_policy: CurrentPolicy,

    /// Whether the user changed this sub-resource's input since load.
    pub dirty: fn(&R) -> bool,

    /// The previously-fetched snapshot carried on the input, if any.
    pub current: fn(&R) -> Option<&Manifest>,

    /// Desired document for a brand-new object.
    pub create_draft: fn(&R) -> Result<Manifest, DraftError>,

    /// Desired document derived from the current object plus the input.
    pub edit: fn(&Manifest, &R) -> Result<Manifest, DraftError>,
}

/// Binds a request type to its descriptor table.
pub trait Integration {
    type Request: 'static;

    /// Integration name used in audit records and logs.
    const NAME: &'static str;

    /// The static descriptor table. Orders must be unique.
    fn descriptors() -> &'static [SubResource<Self::Request>];
}

//! The two integration types the console ships.
//!
//! Each module configures the generic engine with a static descriptor table
//! and the draft/edit builders for its documents, and exposes one public
//! procedure. Provider and registry-type variation lives entirely inside
//! the builders; the engine never sees it.

pub mod git_server;
pub mod registry;

pub use git_server::{
    GitCredentials, GitProvider, GitServerIntegration, GitServerIntegrationRequest,
    GitServerIntegrationResult, manage_git_server_integration,
};
pub use registry::{
    RegistryAuth, RegistryIntegration, RegistryIntegrationRequest, RegistryIntegrationResult,
    RegistryKind, manage_registry_integration,
};

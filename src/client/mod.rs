//! Typed interfaces to the external collaborators
//!
//! Each collaborator is an `async_trait` so the orchestration layer can be
//! driven by real transports in production and by the in-crate mocks in tests.

pub mod alerting;
pub mod catalog;
pub mod identity;
pub mod orchestrator;
pub mod stream_registry;

pub use alerting::{
    Alert, AlertNamespace, AlertRule, AlertTemplate, AlertingClient, RuleVariable,
    TemplateVariable, UpdateRuleRequest,
};
pub use catalog::{SchemaCatalog, SchemaQuery, SchemaRef};
pub use identity::{Group, IdentityClient, Project};
pub use orchestrator::{
    ApplyActionRequest, LogChunk, LogStream, OrchestratorClient, Resource, ResourceDependency,
    ResourceSpec, ResourceState, Revision,
};
pub use stream_registry::{HttpStreamRegistry, RegistryError, Stream, StreamRegistry};

use thiserror::Error;

/// Status codes reported by the RPC collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    FailedPrecondition,
    Unavailable,
    DeadlineExceeded,
    Internal,
    Unknown,
}

/// Error returned by an RPC collaborator
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code:?}: {message}")]
pub struct RpcError {
    pub code: RpcCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RpcCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Internal, message)
    }
}

/// Ordered record of collaborator calls shared between mocks, so tests can
/// assert on cross-service sequencing.
#[cfg(test)]
pub type CallLog = std::sync::Arc<std::sync::Mutex<Vec<String>>>;

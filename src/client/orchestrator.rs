//! Resource orchestrator contract
//!
//! The orchestrator owns the deployment lifecycle. Resources are generic
//! `{kind, name, labels, spec}` records; the firehose-specific payload lives
//! in `spec.configs` as an opaque structured value.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RpcError;
use crate::request::Caller;

/// Generic resource as tracked by the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub urn: String,
    pub kind: String,
    pub name: String,
    pub project: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub spec: ResourceSpec,
    #[serde(default)]
    pub state: ResourceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(default)]
    pub configs: Option<Value>,
    #[serde(default)]
    pub dependencies: Vec<ResourceDependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDependency {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub output: Option<Value>,
}

/// Payload of an "apply action" call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyActionRequest {
    pub urn: String,
    pub action: String,
    pub params: Value,
    pub labels: BTreeMap<String, String>,
}

/// One entry of the orchestrator's revision history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: String,
    pub urn: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub spec: ResourceSpec,
    pub created_at: DateTime<Utc>,
}

/// A chunk of log output streamed from a running resource
#[derive(Debug, Clone, PartialEq)]
pub struct LogChunk {
    pub data: Vec<u8>,
    pub labels: BTreeMap<String, String>,
}

pub type LogStream = BoxStream<'static, Result<LogChunk, RpcError>>;

#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    async fn create_resource(
        &self,
        resource: Resource,
        caller: &Caller,
    ) -> Result<Resource, RpcError>;

    async fn get_resource(&self, urn: &str) -> Result<Resource, RpcError>;

    async fn update_resource(
        &self,
        urn: &str,
        spec: ResourceSpec,
        labels: BTreeMap<String, String>,
        caller: &Caller,
    ) -> Result<Resource, RpcError>;

    async fn delete_resource(&self, urn: &str, caller: &Caller) -> Result<(), RpcError>;

    async fn list_resources(&self, kind: &str, project: &str) -> Result<Vec<Resource>, RpcError>;

    async fn apply_action(
        &self,
        request: ApplyActionRequest,
        caller: &Caller,
    ) -> Result<Resource, RpcError>;

    async fn get_resource_revisions(&self, urn: &str) -> Result<Vec<Revision>, RpcError>;

    async fn get_log(
        &self,
        urn: &str,
        filter: HashMap<String, String>,
    ) -> Result<LogStream, RpcError>;
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================

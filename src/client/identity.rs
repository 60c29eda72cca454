//! Identity/project service contract

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RpcError;

/// Project metadata key holding the alerting provider namespace id
pub const META_ALERT_NAMESPACE: &str = "alert_namespace";
/// Project metadata key holding the data-source name injected as `entity`
pub const META_DATA_SOURCE: &str = "data_source";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Project {
    /// Numeric ids are accepted either as JSON numbers or numeric strings
    fn metadata_id(&self, key: &str) -> Option<u64> {
        match self.metadata.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn alert_namespace(&self) -> Option<u64> {
        self.metadata_id(META_ALERT_NAMESPACE)
    }

    pub fn data_source(&self) -> Option<&str> {
        self.metadata.get(META_DATA_SOURCE).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn get_project(&self, id: &str) -> Result<Project, RpcError>;

    async fn get_group(&self, id: &str) -> Result<Group, RpcError>;

    async fn list_projects(&self) -> Result<Vec<Project>, RpcError>;
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================

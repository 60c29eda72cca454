//! Schema catalog contract: finds the schema registered for a topic

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RpcError;

/// Asset search criteria for a topic's schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaQuery {
    pub topic: String,
    pub stream: String,
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRef {
    pub name: String,
    pub namespace: String,
    pub id: String,
    pub version: i64,
}

#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    async fn search_schema(&self, query: &SchemaQuery) -> Result<SchemaRef, RpcError>;
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Catalog answering by topic name; records every query in order
    #[derive(Default)]
    pub struct MockCatalog {
        schemas: HashMap<String, Result<SchemaRef, RpcError>>,
        queries: Mutex<Vec<SchemaQuery>>,
    }

    impl MockCatalog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_schema(mut self, topic: &str, namespace: &str, name: &str, version: i64) -> Self {
            self.schemas.insert(
                topic.to_string(),
                Ok(SchemaRef {
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                    id: format!("{}/{}", namespace, name),
                    version,
                }),
            );
            self
        }

        pub fn with_failure(mut self, topic: &str, err: RpcError) -> Self {
            self.schemas.insert(topic.to_string(), Err(err));
            self
        }

        pub fn queries(&self) -> Vec<SchemaQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SchemaCatalog for MockCatalog {
        async fn search_schema(&self, query: &SchemaQuery) -> Result<SchemaRef, RpcError> {
            self.queries.lock().unwrap().push(query.clone());
            self.schemas
                .get(&query.topic)
                .cloned()
                .unwrap_or_else(|| Err(RpcError::not_found(format!("no schema for {}", query.topic))))
        }
    }
}

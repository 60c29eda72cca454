use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Data structures (pure, no I/O)
// ============================================================================

/// Stream registry entry; `url` is the broker address of the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("stream not found")]
    NotFound,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Parse(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Stream URN as understood by the registry: `{stream}:{project}`
pub fn stream_urn(stream_name: &str, project: &str) -> String {
    format!("{}:{}", stream_name, project)
}

// ============================================================================
// SBIO: Trait for abstraction (allows mocking in tests)
// ============================================================================

#[async_trait]
pub trait StreamRegistry: Send + Sync {
    async fn get_stream(&self, urn: &str) -> Result<Stream, RegistryError>;
}

// ============================================================================
// SBIO: I/O implementation (real HTTP client)
// ============================================================================

#[derive(Clone)]
pub struct HttpStreamRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStreamRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl StreamRegistry for HttpStreamRegistry {
    async fn get_stream(&self, urn: &str) -> Result<Stream, RegistryError> {
        let url = format!("{}/streams/{}", self.base_url.trim_end_matches('/'), urn);
        debug!(%url, "resolving stream");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RegistryError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound);
        }
        if status != StatusCode::OK {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RegistryError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        response
            .json::<Stream>()
            .await
            .map_err(|e| RegistryError::Parse(e.to_string()))
    }
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================

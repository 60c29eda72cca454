//! Firehose domain model
//!
//! A Firehose consumes one or more topics of a stream and writes them to a
//! sink. Everything here is a view over state owned by the orchestrator;
//! nothing is persisted locally.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::env::EnvVars;
use crate::error::Error;

/// Key of the release name inside the orchestrator's state output
pub const OUTPUT_RELEASE_NAME: &str = "release_name";

/// Destination of a firehose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SinkType {
    Log,
    Http,
    Jdbc,
    Influxdb,
    Elasticsearch,
    Redis,
    Grpc,
    Prometheus,
    Mongodb,
    Bigtable,
    Bigquery,
    Blob,
}

/// Grouping of sinks that share managed defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkCategory {
    Streaming,
    /// Warehouse-table and blob-store sinks: batched writes with DLQ
    BatchObject,
}

impl SinkType {
    pub const ALL: [SinkType; 12] = [
        SinkType::Log,
        SinkType::Http,
        SinkType::Jdbc,
        SinkType::Influxdb,
        SinkType::Elasticsearch,
        SinkType::Redis,
        SinkType::Grpc,
        SinkType::Prometheus,
        SinkType::Mongodb,
        SinkType::Bigtable,
        SinkType::Bigquery,
        SinkType::Blob,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            SinkType::Log => "LOG",
            SinkType::Http => "HTTP",
            SinkType::Jdbc => "JDBC",
            SinkType::Influxdb => "INFLUXDB",
            SinkType::Elasticsearch => "ELASTICSEARCH",
            SinkType::Redis => "REDIS",
            SinkType::Grpc => "GRPC",
            SinkType::Prometheus => "PROMETHEUS",
            SinkType::Mongodb => "MONGODB",
            SinkType::Bigtable => "BIGTABLE",
            SinkType::Bigquery => "BIGQUERY",
            SinkType::Blob => "BLOB",
        }
    }

    pub fn category(self) -> SinkCategory {
        match self {
            SinkType::Bigquery | SinkType::Blob => SinkCategory::BatchObject,
            _ => SinkCategory::Streaming,
        }
    }
}

impl fmt::Display for SinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        SinkType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| Error::validation(format!("unknown sink type '{}'", s)))
    }
}

/// A user reference recorded for audit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMetadata {
    #[serde(default)]
    pub created_by: UserRef,
    #[serde(default)]
    pub updated_by: UserRef,
}

/// Deployment configuration of a firehose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirehoseConfig {
    #[serde(default = "default_replicas")]
    pub replicas: u32,

    #[serde(default)]
    pub deployment_id: String,

    #[serde(default)]
    pub image_tag: String,

    /// Set by the orchestrator for sinks that auto-stop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub env_vars: EnvVars,
}

fn default_replicas() -> u32 {
    1
}

impl Default for FirehoseConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            deployment_id: String::new(),
            image_tag: String::new(),
            stop_time: None,
            env_vars: EnvVars::default(),
        }
    }
}

impl FirehoseConfig {
    pub fn sink_type(&self) -> Result<SinkType, Error> {
        self.env_vars
            .sink_type()
            .ok_or_else(|| Error::validation("SINK_TYPE is required"))?
            .parse()
    }

    pub fn stream_name(&self) -> Option<&str> {
        self.env_vars.stream_name()
    }
}

/// Observed state as reported by the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirehoseState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub output: Map<String, Value>,
}

impl FirehoseState {
    pub fn release_name(&self) -> Option<&str> {
        self.output
            .get(OUTPUT_RELEASE_NAME)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Firehose {
    #[serde(default)]
    pub urn: String,

    /// Slug; derived from the title when left empty
    #[serde(default)]
    pub name: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Project slug
    #[serde(default)]
    pub project: String,

    /// Owning group id
    #[serde(default)]
    pub group: String,

    /// Cluster the firehose is deployed to
    #[serde(default)]
    pub kube_cluster: String,

    /// Free-form labels; audit keys are carried in `metadata`
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub config: FirehoseConfig,

    #[serde(default)]
    pub state: FirehoseState,

    #[serde(default)]
    pub metadata: AuditMetadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial update of an existing firehose; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirehoseUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub replicas: Option<u32>,
    #[serde(default)]
    pub image_tag: Option<String>,
    /// Keys merged over the current env vars
    #[serde(default)]
    pub env_vars: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
}

/// Criteria applied after listing a project's firehoses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListFilter {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub stream_name: Option<String>,
    #[serde(default)]
    pub sink_type: Option<SinkType>,
}

impl ListFilter {
    /// Whether matching needs the decoded config rather than labels only
    pub fn needs_config(&self) -> bool {
        self.stream_name.is_some() || self.sink_type.is_some()
    }

    pub fn matches(&self, firehose: &Firehose) -> bool {
        if let Some(group) = &self.group {
            if &firehose.group != group {
                return false;
            }
        }
        if let Some(stream) = &self.stream_name {
            if firehose.config.stream_name() != Some(stream.as_str()) {
                return false;
            }
        }
        if let Some(sink) = self.sink_type {
            match firehose.config.sink_type() {
                Ok(t) if t == sink => {}
                _ => return false,
            }
        }
        true
    }
}

/// Log stream selection, encoded to the orchestrator's filter map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogFilter {
    #[serde(default)]
    pub pod: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub since_seconds: Option<u64>,
    #[serde(default)]
    pub tail_lines: Option<u64>,
    #[serde(default)]
    pub follow: bool,
}

impl LogFilter {
    pub fn to_map(&self) -> std::collections::HashMap<String, String> {
        let mut out = std::collections::HashMap::new();
        if let Some(pod) = &self.pod {
            out.insert("pod".to_string(), pod.clone());
        }
        if let Some(container) = &self.container {
            out.insert("container".to_string(), container.clone());
        }
        if let Some(since) = self.since_seconds {
            out.insert("since_seconds".to_string(), since.to_string());
        }
        if let Some(tail) = self.tail_lines {
            out.insert("tail_lines".to_string(), tail.to_string());
        }
        if self.follow {
            out.insert("follow".to_string(), "true".to_string());
        }
        out
    }
}

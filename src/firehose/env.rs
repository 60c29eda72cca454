//! Structured environment configuration of a firehose
//!
//! Keys fall in two classes. Passthrough keys are whatever the user supplied
//! and are only ever filled when absent. Managed keys ([`ManagedKey`]) are
//! owned by this layer: once set they shadow any passthrough value of the
//! same name when the map is rendered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const SOURCE_KAFKA_TOPIC: &str = "SOURCE_KAFKA_TOPIC";
pub const SOURCE_KAFKA_BROKERS: &str = "SOURCE_KAFKA_BROKERS";
pub const SOURCE_KAFKA_CONSUMER_GROUP_ID: &str = "SOURCE_KAFKA_CONSUMER_GROUP_ID";
pub const SINK_TYPE: &str = "SINK_TYPE";
pub const STREAM_NAME: &str = "STREAM_NAME";
pub const SCHEMA_REGISTRY_STENCIL_URLS: &str = "SCHEMA_REGISTRY_STENCIL_URLS";
pub const SCHEMA_REGISTRY_STENCIL_ENABLE: &str = "SCHEMA_REGISTRY_STENCIL_ENABLE";
pub const INPUT_SCHEMA_PROTO_CLASS: &str = "INPUT_SCHEMA_PROTO_CLASS";
pub const SINK_BIGQUERY_TABLE_NAME: &str = "SINK_BIGQUERY_TABLE_NAME";
pub const SINK_BIGQUERY_DATASET_NAME: &str = "SINK_BIGQUERY_DATASET_NAME";

/// Keys whose value is always dictated by this layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManagedKey {
    StencilEnable,
    DlqSinkEnable,
    DlqWriterType,
    DlqBlobStorageType,
    DlqGcsBucketName,
    DlqGcsProjectId,
    RetryMaxAttempts,
    RetryBackoffMaxMs,
    JavaToolOptions,
    ConsumerMode,
    PoolNumThreads,
    PoolQueuePollTimeoutMs,
    PartitioningEnable,
    PartitionKey,
}

impl ManagedKey {
    pub const ALL: [ManagedKey; 14] = [
        ManagedKey::StencilEnable,
        ManagedKey::DlqSinkEnable,
        ManagedKey::DlqWriterType,
        ManagedKey::DlqBlobStorageType,
        ManagedKey::DlqGcsBucketName,
        ManagedKey::DlqGcsProjectId,
        ManagedKey::RetryMaxAttempts,
        ManagedKey::RetryBackoffMaxMs,
        ManagedKey::JavaToolOptions,
        ManagedKey::ConsumerMode,
        ManagedKey::PoolNumThreads,
        ManagedKey::PoolQueuePollTimeoutMs,
        ManagedKey::PartitioningEnable,
        ManagedKey::PartitionKey,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ManagedKey::StencilEnable => SCHEMA_REGISTRY_STENCIL_ENABLE,
            ManagedKey::DlqSinkEnable => "DLQ_SINK_ENABLE",
            ManagedKey::DlqWriterType => "DLQ_WRITER_TYPE",
            ManagedKey::DlqBlobStorageType => "DLQ_BLOB_STORAGE_TYPE",
            ManagedKey::DlqGcsBucketName => "DLQ_GCS_BUCKET_NAME",
            ManagedKey::DlqGcsProjectId => "DLQ_GCS_GOOGLE_CLOUD_PROJECT_ID",
            ManagedKey::RetryMaxAttempts => "RETRY_MAX_ATTEMPTS",
            ManagedKey::RetryBackoffMaxMs => "RETRY_EXPONENTIAL_BACKOFF_MAX_MS",
            ManagedKey::JavaToolOptions => "JAVA_TOOL_OPTIONS",
            ManagedKey::ConsumerMode => "SOURCE_KAFKA_CONSUMER_MODE",
            ManagedKey::PoolNumThreads => "SINK_POOL_NUM_THREADS",
            ManagedKey::PoolQueuePollTimeoutMs => "SINK_POOL_QUEUE_POLL_TIMEOUT_MS",
            ManagedKey::PartitioningEnable => "SINK_BIGQUERY_TABLE_PARTITIONING_ENABLE",
            ManagedKey::PartitionKey => "SINK_BIGQUERY_TABLE_PARTITION_KEY",
        }
    }

    pub fn from_key(key: &str) -> Option<ManagedKey> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

/// Environment variables of a firehose.
///
/// Serializes as a flat string map; anything read back from the wire lands
/// in the passthrough set until synthesis re-applies the managed keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct EnvVars {
    passthrough: BTreeMap<String, String>,
    managed: BTreeMap<ManagedKey, String>,
}

impl From<BTreeMap<String, String>> for EnvVars {
    fn from(passthrough: BTreeMap<String, String>) -> Self {
        Self {
            passthrough,
            managed: BTreeMap::new(),
        }
    }
}

impl From<EnvVars> for BTreeMap<String, String> {
    fn from(env: EnvVars) -> Self {
        env.to_map()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<BTreeMap<_, _>>()
            .into()
    }
}

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective value of a key; a managed value shadows a passthrough one
    pub fn get(&self, key: &str) -> Option<&str> {
        ManagedKey::from_key(key)
            .and_then(|k| self.managed.get(&k))
            .or_else(|| self.passthrough.get(key))
            .map(String::as_str)
    }

    /// A key counts as unset when absent or blank
    pub fn is_unset(&self, key: &str) -> bool {
        self.get(key).map(|v| v.trim().is_empty()).unwrap_or(true)
    }

    /// Set a caller-controlled key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.passthrough.insert(key.into(), value.into());
    }

    /// Fill a key only when it is unset. Returns true if the value was written.
    pub fn set_if_absent(&mut self, key: &str, value: impl Into<String>) -> bool {
        if self.is_unset(key) {
            self.passthrough.insert(key.to_string(), value.into());
            true
        } else {
            false
        }
    }

    pub fn set_managed(&mut self, key: ManagedKey, value: impl Into<String>) {
        self.managed.insert(key, value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        if let Some(k) = ManagedKey::from_key(key) {
            self.managed.remove(&k);
        }
        self.passthrough.remove(key)
    }

    /// Merge caller-supplied keys over the current passthrough set
    pub fn merge(&mut self, other: BTreeMap<String, String>) {
        self.passthrough.extend(other);
    }

    /// Rendered map: passthrough keys overlaid by managed keys
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut out = self.passthrough.clone();
        for (key, value) in &self.managed {
            out.insert(key.as_str().to_string(), value.clone());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.to_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.passthrough.is_empty() && self.managed.is_empty()
    }

    pub fn sink_type(&self) -> Option<&str> {
        self.get(SINK_TYPE)
    }

    pub fn stream_name(&self) -> Option<&str> {
        self.get(STREAM_NAME)
    }

    pub fn topic(&self) -> Option<&str> {
        self.get(SOURCE_KAFKA_TOPIC)
    }

    /// Individual topics of the pipe-delimited topic expression
    pub fn topics(&self) -> Vec<&str> {
        self.topic()
            .map(|t| {
                t.split('|')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn brokers(&self) -> Option<&str> {
        self.get(SOURCE_KAFKA_BROKERS)
    }

    pub fn consumer_group_id(&self) -> Option<&str> {
        self.get(SOURCE_KAFKA_CONSUMER_GROUP_ID)
    }

    pub fn stencil_urls(&self) -> Option<&str> {
        self.get(SCHEMA_REGISTRY_STENCIL_URLS)
    }

    pub fn proto_class(&self) -> Option<&str> {
        self.get(INPUT_SCHEMA_PROTO_CLASS)
    }
}

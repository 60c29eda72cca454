//! Config synthesis: turns partial user env vars into the complete,
//! environment-dependent configuration handed to the orchestrator.
//!
//! Steps run in order and fail fast. Synthesis works on its own copy of the
//! env vars, so a failure leaves nothing half-merged.

use tracing::{debug, info};

use super::env::{
    EnvVars, ManagedKey, SCHEMA_REGISTRY_STENCIL_URLS, SINK_BIGQUERY_DATASET_NAME,
    SINK_BIGQUERY_TABLE_NAME, SOURCE_KAFKA_BROKERS,
};
use super::model::{SinkCategory, SinkType};
use crate::client::stream_registry::stream_urn;
use crate::client::{SchemaCatalog, SchemaQuery, StreamRegistry};
use crate::config::{SinkDefaults, StencilSettings};
use crate::error::{Error, LookupError, Result};
use crate::request::RequestContext;

/// Where a managed value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagedValue {
    Literal(&'static str),
    DlqBucket,
    DlqProject,
    JavaToolOptions,
    RetryMaxAttempts,
    RetryBackoffMaxMs,
    PoolNumThreads,
    PoolQueuePollTimeoutMs,
    PartitionKey,
}

impl ManagedValue {
    fn resolve(self, defaults: &SinkDefaults) -> String {
        match self {
            ManagedValue::Literal(v) => v.to_string(),
            ManagedValue::DlqBucket => defaults.dlq_gcs_bucket.clone(),
            ManagedValue::DlqProject => defaults.dlq_gcs_project_id.clone(),
            ManagedValue::JavaToolOptions => defaults.java_tool_options.clone(),
            ManagedValue::RetryMaxAttempts => defaults.retry_max_attempts.to_string(),
            ManagedValue::RetryBackoffMaxMs => defaults.retry_backoff_max_ms.to_string(),
            ManagedValue::PoolNumThreads => defaults.pool_num_threads.to_string(),
            ManagedValue::PoolQueuePollTimeoutMs => defaults.pool_queue_poll_timeout_ms.to_string(),
            ManagedValue::PartitionKey => defaults.partition_key.clone(),
        }
    }
}

/// Value derived from the firehose itself for fill-if-absent keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derived {
    /// First topic with `.` and `-` replaced by `_`
    TableFromTopic,
    DatasetFromStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkRule {
    /// Always written, overriding the caller
    Managed(ManagedKey, ManagedValue),
    /// Written only when the caller left the key unset
    FillGap(&'static str, Derived),
}

const BATCH_OBJECT_RULES: &[SinkRule] = &[
    SinkRule::Managed(ManagedKey::DlqSinkEnable, ManagedValue::Literal("true")),
    SinkRule::Managed(ManagedKey::DlqWriterType, ManagedValue::Literal("BLOB_STORAGE")),
    SinkRule::Managed(ManagedKey::DlqBlobStorageType, ManagedValue::Literal("GCS")),
    SinkRule::Managed(ManagedKey::DlqGcsBucketName, ManagedValue::DlqBucket),
    SinkRule::Managed(ManagedKey::DlqGcsProjectId, ManagedValue::DlqProject),
    SinkRule::Managed(ManagedKey::RetryMaxAttempts, ManagedValue::RetryMaxAttempts),
    SinkRule::Managed(ManagedKey::RetryBackoffMaxMs, ManagedValue::RetryBackoffMaxMs),
    SinkRule::Managed(ManagedKey::JavaToolOptions, ManagedValue::JavaToolOptions),
];

const WAREHOUSE_TABLE_RULES: &[SinkRule] = &[
    SinkRule::Managed(ManagedKey::ConsumerMode, ManagedValue::Literal("ASYNC")),
    SinkRule::Managed(ManagedKey::PoolNumThreads, ManagedValue::PoolNumThreads),
    SinkRule::Managed(
        ManagedKey::PoolQueuePollTimeoutMs,
        ManagedValue::PoolQueuePollTimeoutMs,
    ),
    SinkRule::Managed(ManagedKey::PartitioningEnable, ManagedValue::Literal("true")),
    SinkRule::Managed(ManagedKey::PartitionKey, ManagedValue::PartitionKey),
    SinkRule::FillGap(SINK_BIGQUERY_TABLE_NAME, Derived::TableFromTopic),
    SinkRule::FillGap(SINK_BIGQUERY_DATASET_NAME, Derived::DatasetFromStream),
];

/// Ordered rule tables applying to a sink type
pub fn sink_rules(sink: SinkType) -> Vec<&'static [SinkRule]> {
    let mut tables = Vec::new();
    if sink.category() == SinkCategory::BatchObject {
        tables.push(BATCH_OBJECT_RULES);
    }
    if sink == SinkType::Bigquery {
        tables.push(WAREHOUSE_TABLE_RULES);
    }
    tables
}

pub fn table_name_from_topic(topic: &str) -> String {
    topic.replace(['.', '-'], "_")
}

/// Per-call synthesis options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisOptions {
    /// Project slug; part of the stream URN and the schema search
    pub project: String,
    /// Re-resolve stencil URLs even when already present
    pub force_stencil_refresh: bool,
}

pub struct ConfigSynthesizer<'a> {
    registry: &'a dyn StreamRegistry,
    catalog: &'a dyn SchemaCatalog,
    stencil: &'a StencilSettings,
    defaults: &'a SinkDefaults,
}

impl<'a> ConfigSynthesizer<'a> {
    pub fn new(
        registry: &'a dyn StreamRegistry,
        catalog: &'a dyn SchemaCatalog,
        stencil: &'a StencilSettings,
        defaults: &'a SinkDefaults,
    ) -> Self {
        Self {
            registry,
            catalog,
            stencil,
            defaults,
        }
    }

    pub async fn synthesize(
        &self,
        ctx: &RequestContext,
        env: &EnvVars,
        opts: &SynthesisOptions,
    ) -> Result<EnvVars> {
        let mut env = env.clone();

        let sink: SinkType = env
            .sink_type()
            .ok_or_else(|| Error::validation("SINK_TYPE is required"))?
            .parse()?;
        let stream_name = env
            .stream_name()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::validation("STREAM_NAME is required"))?
            .to_string();
        if env.topics().is_empty() {
            return Err(Error::validation("SOURCE_KAFKA_TOPIC is required"));
        }

        if env.is_unset(SOURCE_KAFKA_BROKERS) {
            let urn = stream_urn(&stream_name, &opts.project);
            let stream = ctx
                .guard(self.registry.get_stream(&urn))
                .await?
                .map_err(|e| LookupError::from_registry(e, &urn))?;
            debug!(stream = %urn, brokers = %stream.url, "resolved brokers");
            env.insert(SOURCE_KAFKA_BROKERS, stream.url);
        }

        env.set_managed(ManagedKey::StencilEnable, "true");
        if env.is_unset(SCHEMA_REGISTRY_STENCIL_URLS) || opts.force_stencil_refresh {
            let urls = self
                .resolve_stencil_urls(ctx, &env, &stream_name, &opts.project)
                .await?;
            env.insert(SCHEMA_REGISTRY_STENCIL_URLS, urls);
        }

        for table in sink_rules(sink) {
            for rule in table {
                match *rule {
                    SinkRule::Managed(key, value) => {
                        env.set_managed(key, value.resolve(self.defaults));
                    }
                    SinkRule::FillGap(key, derived) => {
                        let value = match derived {
                            Derived::TableFromTopic => {
                                table_name_from_topic(env.topics().first().copied().unwrap_or(""))
                            }
                            Derived::DatasetFromStream => stream_name.clone(),
                        };
                        env.set_if_absent(key, value);
                    }
                }
            }
        }

        info!(sink = %sink, stream = %stream_name, "synthesized firehose config");
        Ok(env)
    }

    /// One catalog lookup per topic, in order; the first failure aborts.
    async fn resolve_stencil_urls(
        &self,
        ctx: &RequestContext,
        env: &EnvVars,
        stream_name: &str,
        project: &str,
    ) -> Result<String> {
        let mut urls: Vec<String> = Vec::new();
        for topic in env.topics() {
            let query = SchemaQuery {
                topic: topic.to_string(),
                stream: stream_name.to_string(),
                project: project.to_string(),
                proto_class: env.proto_class().map(str::to_string),
            };
            let schema = ctx
                .guard(self.catalog.search_schema(&query))
                .await?
                .map_err(|e| LookupError::from_catalog(e, topic))?;
            let url = self
                .stencil
                .schema_url(&schema.namespace, &schema.name, schema.version);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(urls.join(","))
    }
}

//! Command implementations for the CLI
//!
//! SBIO pattern: Commands return Results, I/O is handled by caller

use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::client::{
    Resource, RpcCode, RpcError, SchemaCatalog, SchemaQuery, SchemaRef, StreamRegistry,
};
use crate::config::{Settings, SettingsError};
use crate::error::Error as FirehoseError;
use crate::firehose::env::SOURCE_KAFKA_CONSUMER_GROUP_ID;
use crate::firehose::revisions::{self, DiffEntry};
use crate::firehose::synth::{ConfigSynthesizer, SynthesisOptions};
use crate::firehose::{mapper, Firehose};
use crate::request::{Caller, RequestContext};

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Firehose(#[from] FirehoseError),
}

/// Result type for commands
pub type CommandResult<T> = Result<T, CommandError>;

// ============================================================================
// Manifest loading
// ============================================================================

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Parse manifest content, YAML or JSON depending on the file extension
pub fn parse_manifest<T: DeserializeOwned>(path: &Path, content: &str) -> CommandResult<T> {
    if is_yaml(path) {
        serde_yaml::from_str(content).map_err(|e| CommandError::Manifest(e.to_string()))
    } else {
        Ok(serde_json::from_str(content)?)
    }
}

/// Load and parse a firehose manifest
pub fn load_firehose_manifest(path: &Path) -> CommandResult<Firehose> {
    let content = std::fs::read_to_string(path)?;
    parse_manifest(path, &content)
}

/// Load any JSON or YAML document as a structured value
pub fn load_spec(path: &Path) -> CommandResult<Value> {
    let content = std::fs::read_to_string(path)?;
    parse_manifest(path, &content)
}

// ============================================================================
// Render
// ============================================================================

/// Stand-in catalog for offline rendering: every lookup fails, so topics
/// must already carry `SCHEMA_REGISTRY_STENCIL_URLS`.
pub struct OfflineCatalog;

#[async_trait]
impl SchemaCatalog for OfflineCatalog {
    async fn search_schema(&self, query: &SchemaQuery) -> Result<SchemaRef, RpcError> {
        Err(RpcError::new(
            RpcCode::FailedPrecondition,
            format!(
                "no schema catalog available offline; set SCHEMA_REGISTRY_STENCIL_URLS for topic {}",
                query.topic
            ),
        ))
    }
}

/// Synthesize the manifest's env vars and map it to an orchestrator resource
pub async fn render_manifest(
    mut firehose: Firehose,
    project: Option<&str>,
    settings: &Settings,
    registry: &dyn StreamRegistry,
) -> CommandResult<Resource> {
    let project = project
        .map(str::to_string)
        .or_else(|| Some(firehose.project.clone()).filter(|p| !p.is_empty()))
        .ok_or_else(|| {
            CommandError::Manifest("project is required (manifest or --project)".into())
        })?;

    if firehose.name.is_empty() {
        firehose.name = mapper::slugify(&firehose.title);
    }
    let mut env = firehose.config.env_vars.clone();
    env.set_if_absent(
        SOURCE_KAFKA_CONSUMER_GROUP_ID,
        format!("{}-{}", firehose.name, settings.firehose.consumer_group_suffix),
    );

    let catalog = OfflineCatalog;
    let synth = ConfigSynthesizer::new(registry, &catalog, &settings.stencil, &settings.sinks);
    let ctx = RequestContext::new(Caller::default());
    let opts = SynthesisOptions {
        project: project.clone(),
        force_stencil_refresh: false,
    };
    firehose.config.env_vars = synth.synthesize(&ctx, &env, &opts).await?;

    Ok(mapper::to_resource(&firehose, &project)?)
}

// ============================================================================
// Diff
// ============================================================================

pub fn diff_specs(old: &Value, new: &Value) -> Vec<DiffEntry> {
    revisions::diff(old, new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::stream_registry::mock::MockStreamRegistry;
    use crate::error::ErrorKind;
    use std::io::Write;
    use std::path::PathBuf;

    const MANIFEST: &str = r#"
title: Orders Log
project: data-platform
kube_cluster: urn:cluster:prod
config:
  env_vars:
    SINK_TYPE: LOG
    STREAM_NAME: main
    SOURCE_KAFKA_TOPIC: orders
    SCHEMA_REGISTRY_STENCIL_URLS: http://stencil/orders
"#;

    #[test]
    fn test_parse_yaml_manifest() {
        let firehose: Firehose = parse_manifest(&PathBuf::from("fh.yaml"), MANIFEST).unwrap();
        assert_eq!(firehose.title, "Orders Log");
        assert_eq!(firehose.config.replicas, 1);
        assert_eq!(firehose.config.env_vars.topic(), Some("orders"));
    }

    #[test]
    fn test_parse_json_manifest() {
        let firehose: Firehose = parse_manifest(
            &PathBuf::from("fh.json"),
            r#"{"title": "x", "config": {"replicas": 2, "env_vars": {"SINK_TYPE": "HTTP"}}}"#,
        )
        .unwrap();
        assert_eq!(firehose.config.replicas, 2);
        assert_eq!(firehose.config.env_vars.sink_type(), Some("HTTP"));
    }

    #[test]
    fn test_parse_manifest_errors() {
        let err = parse_manifest::<Firehose>(&PathBuf::from("fh.yml"), "title: [").unwrap_err();
        assert!(matches!(err, CommandError::Manifest(_)));
        let err = parse_manifest::<Firehose>(&PathBuf::from("fh.json"), "{").unwrap_err();
        assert!(matches!(err, CommandError::Json(_)));
    }

    #[test]
    fn test_load_spec_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"replicas": 3}}"#).unwrap();
        let spec = load_spec(file.path()).unwrap();
        assert_eq!(spec["replicas"], 3);
    }

    #[tokio::test]
    async fn test_render_manifest() {
        let firehose: Firehose = parse_manifest(&PathBuf::from("fh.yaml"), MANIFEST).unwrap();
        let registry = MockStreamRegistry::new().with_stream("main:data-platform", "broker:9092");
        let settings = Settings::default();

        let resource = render_manifest(firehose, None, &settings, &registry).await.unwrap();
        assert_eq!(resource.name, "orders-log");
        assert_eq!(resource.project, "data-platform");
        let env = &resource.spec.configs.as_ref().unwrap()["env_variables"];
        assert_eq!(env["SOURCE_KAFKA_BROKERS"], "broker:9092");
        assert_eq!(env["SOURCE_KAFKA_CONSUMER_GROUP_ID"], "orders-log-0001");
        assert_eq!(env["SCHEMA_REGISTRY_STENCIL_ENABLE"], "true");
    }

    #[tokio::test]
    async fn test_render_without_stencil_urls_fails() {
        let mut firehose: Firehose = parse_manifest(&PathBuf::from("fh.yaml"), MANIFEST).unwrap();
        firehose.config.env_vars.remove("SCHEMA_REGISTRY_STENCIL_URLS");
        let registry = MockStreamRegistry::new().with_stream("main:data-platform", "broker:9092");

        let err = render_manifest(firehose, None, &Settings::default(), &registry)
            .await
            .unwrap_err();
        match err {
            CommandError::Firehose(e) => assert_eq!(e.kind(), ErrorKind::Internal),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_render_requires_project() {
        let mut firehose: Firehose = parse_manifest(&PathBuf::from("fh.yaml"), MANIFEST).unwrap();
        firehose.project.clear();
        let registry = MockStreamRegistry::new();
        let err = render_manifest(firehose, None, &Settings::default(), &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Manifest(_)));
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default settings file location: ~/.firehose/config
pub fn default_settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".firehose")
        .join("config")
}

/// Errors that can occur while loading settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse settings: {0}")]
    ParseError(String),

    #[error("Failed to write settings: {0}")]
    WriteError(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Complete settings for the orchestration layer
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub stream_registry: StreamRegistrySettings,

    #[serde(default)]
    pub stencil: StencilSettings,

    #[serde(default)]
    pub alerting: AlertingSettings,

    #[serde(default)]
    pub firehose: FirehoseSettings,

    /// Values written into managed sink keys
    #[serde(default)]
    pub sinks: SinkDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamRegistrySettings {
    /// Base URL, e.g. "http://stream-registry:8080"
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u64,
}

impl Default for StreamRegistrySettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_registry_timeout(),
        }
    }
}

fn default_registry_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StencilSettings {
    /// Host used to build schema URLs handed to the firehose
    #[serde(default)]
    pub base_url: String,
}

impl StencilSettings {
    pub fn schema_url(&self, namespace: &str, schema: &str, version: i64) -> String {
        format!(
            "{}/v1beta1/namespaces/{}/schemas/{}/versions/{}",
            self.base_url.trim_end_matches('/'),
            namespace,
            schema,
            version
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertingSettings {
    #[serde(default = "default_provider_type")]
    pub provider_type: String,

    #[serde(default = "default_rule_namespace")]
    pub rule_namespace: String,

    #[serde(default = "default_template_tag")]
    pub template_tag: String,
}

impl Default for AlertingSettings {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            rule_namespace: default_rule_namespace(),
            template_tag: default_template_tag(),
        }
    }
}

fn default_provider_type() -> String {
    "cortex".to_string()
}

fn default_rule_namespace() -> String {
    "firehose".to_string()
}

fn default_template_tag() -> String {
    "firehose".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FirehoseSettings {
    /// How long a log-sink firehose runs after `start` before the
    /// orchestrator stops it
    #[serde(default = "default_log_sink_ttl")]
    pub log_sink_ttl_hours: i64,

    #[serde(default = "default_consumer_group_suffix")]
    pub consumer_group_suffix: String,
}

impl Default for FirehoseSettings {
    fn default() -> Self {
        Self {
            log_sink_ttl_hours: default_log_sink_ttl(),
            consumer_group_suffix: default_consumer_group_suffix(),
        }
    }
}

fn default_log_sink_ttl() -> i64 {
    24
}

fn default_consumer_group_suffix() -> String {
    "0001".to_string()
}

/// Environment-dependent values for the managed sink keys
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SinkDefaults {
    #[serde(default)]
    pub dlq_gcs_bucket: String,

    #[serde(default)]
    pub dlq_gcs_project_id: String,

    #[serde(default = "default_java_tool_options")]
    pub java_tool_options: String,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,

    #[serde(default = "default_pool_num_threads")]
    pub pool_num_threads: u32,

    #[serde(default = "default_pool_queue_poll_timeout_ms")]
    pub pool_queue_poll_timeout_ms: u64,

    #[serde(default = "default_partition_key")]
    pub partition_key: String,
}

impl Default for SinkDefaults {
    fn default() -> Self {
        Self {
            dlq_gcs_bucket: String::new(),
            dlq_gcs_project_id: String::new(),
            java_tool_options: default_java_tool_options(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_backoff_max_ms: default_retry_backoff_max_ms(),
            pool_num_threads: default_pool_num_threads(),
            pool_queue_poll_timeout_ms: default_pool_queue_poll_timeout_ms(),
            partition_key: default_partition_key(),
        }
    }
}

fn default_java_tool_options() -> String {
    "-javaagent:jolokia-jvm-agent.jar=port=8778,host=localhost -Xmx1800m -Xms1800m".to_string()
}

fn default_retry_max_attempts() -> u32 {
    10
}

fn default_retry_backoff_max_ms() -> u64 {
    60_000
}

fn default_pool_num_threads() -> u32 {
    4
}

fn default_pool_queue_poll_timeout_ms() -> u64 {
    100
}

fn default_partition_key() -> String {
    "event_timestamp".to_string()
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Upper bound for `firehose.log_sink_ttl_hours` (one year)
pub const MAX_LOG_SINK_TTL_HOURS: i64 = 24 * 365;

/// Parse settings from a YAML string
pub fn parse_settings(content: &str) -> Result<Settings, SettingsError> {
    let settings: Settings =
        serde_yaml::from_str(content).map_err(|e| SettingsError::ParseError(e.to_string()))?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Reject values the orchestration layer cannot act on
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    let ttl = settings.firehose.log_sink_ttl_hours;
    if !(1..=MAX_LOG_SINK_TTL_HOURS).contains(&ttl) {
        return Err(SettingsError::InvalidValue(
            "firehose.log_sink_ttl_hours".to_string(),
            ttl.to_string(),
        ));
    }
    Ok(())
}

/// Serialize settings to a YAML string
pub fn serialize_settings(settings: &Settings) -> Result<String, SettingsError> {
    serde_yaml::to_string(settings).map_err(|e| SettingsError::WriteError(e.to_string()))
}

/// Apply overrides from a variable lookup (normally the process environment)
pub fn apply_overrides<F>(settings: &mut Settings, lookup: F) -> Result<(), SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("FIREHOSE_STREAM_REGISTRY_URL") {
        settings.stream_registry.base_url = url;
    }
    if let Some(secs) = lookup("FIREHOSE_STREAM_REGISTRY_TIMEOUT") {
        settings.stream_registry.timeout_secs = secs.parse().map_err(|_| {
            SettingsError::InvalidValue("FIREHOSE_STREAM_REGISTRY_TIMEOUT".to_string(), secs)
        })?;
    }
    if let Some(url) = lookup("FIREHOSE_STENCIL_URL") {
        settings.stencil.base_url = url;
    }
    if let Some(bucket) = lookup("FIREHOSE_DLQ_BUCKET") {
        settings.sinks.dlq_gcs_bucket = bucket;
    }
    if let Some(project) = lookup("FIREHOSE_DLQ_PROJECT") {
        settings.sinks.dlq_gcs_project_id = project;
    }
    Ok(())
}

// ============================================================================
// SBIO: I/O operations
// ============================================================================

/// Load settings from disk, then apply environment overrides.
/// A missing file at the default location yields defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    let mut settings = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SettingsError::NotFound(p.to_path_buf()));
            }
            parse_settings(&std::fs::read_to_string(p)?)?
        }
        None => {
            let p = default_settings_path();
            if p.exists() {
                parse_settings(&std::fs::read_to_string(&p)?)?
            } else {
                Settings::default()
            }
        }
    };

    apply_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_minimal_settings() {
        let settings = parse_settings("stream_registry:\n  base_url: http://registry\n").unwrap();
        assert_eq!(settings.stream_registry.base_url, "http://registry");
        assert_eq!(settings.stream_registry.timeout_secs, 10);
        assert_eq!(settings.alerting.provider_type, "cortex");
        assert_eq!(settings.firehose.log_sink_ttl_hours, 24);
        assert_eq!(settings.sinks.partition_key, "event_timestamp");
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = parse_settings("stream_registry: [unclosed");
        assert!(matches!(result, Err(SettingsError::ParseError(_))));
    }

    #[test]
    fn test_parse_rejects_out_of_range_ttl() {
        for ttl in ["0", "-3", "9223372036854775807"] {
            let yaml = format!("firehose:\n  log_sink_ttl_hours: {}\n", ttl);
            match parse_settings(&yaml) {
                Err(SettingsError::InvalidValue(key, _)) => {
                    assert_eq!(key, "firehose.log_sink_ttl_hours")
                }
                other => panic!("ttl {} accepted: {:?}", ttl, other),
            }
        }
        assert_eq!(
            parse_settings("firehose:\n  log_sink_ttl_hours: 48\n")
                .unwrap()
                .firehose
                .log_sink_ttl_hours,
            48
        );
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut settings = Settings::default();
        settings.sinks.dlq_gcs_bucket = "dlq-bucket".to_string();
        let yaml = serialize_settings(&settings).unwrap();
        assert_eq!(parse_settings(&yaml).unwrap(), settings);
    }

    #[test]
    fn test_apply_overrides() {
        let env: HashMap<&str, &str> = [
            ("FIREHOSE_STREAM_REGISTRY_URL", "http://override"),
            ("FIREHOSE_DLQ_BUCKET", "bucket-x"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        apply_overrides(&mut settings, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(settings.stream_registry.base_url, "http://override");
        assert_eq!(settings.sinks.dlq_gcs_bucket, "bucket-x");
        assert_eq!(settings.stencil.base_url, "");
    }

    #[test]
    fn test_apply_overrides_rejects_bad_timeout() {
        let mut settings = Settings::default();
        let result = apply_overrides(&mut settings, |k| {
            (k == "FIREHOSE_STREAM_REGISTRY_TIMEOUT").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(SettingsError::InvalidValue(_, _))));
    }

    #[test]
    fn test_schema_url() {
        let stencil = StencilSettings {
            base_url: "http://stencil/".to_string(),
        };
        assert_eq!(
            stencil.schema_url("odpf", "booking", 3),
            "http://stencil/v1beta1/namespaces/odpf/schemas/booking/versions/3"
        );
    }

    #[test]
    fn test_load_settings_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"stencil:\n  base_url: http://stencil\n")
            .unwrap();
        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.stencil.base_url, "http://stencil");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_settings(Some(Path::new("/nonexistent/firehose.yaml")));
        assert!(matches!(result, Err(SettingsError::NotFound(_))));
    }
}

//! Mapping between [`Firehose`] and the orchestrator's generic [`Resource`]

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::env::EnvVars;
use super::model::{AuditMetadata, Firehose, FirehoseConfig, FirehoseState, UserRef};
use crate::client::{Resource, ResourceDependency, ResourceSpec, ResourceState};
use crate::error::{Error, Result};

pub const KIND_FIREHOSE: &str = "firehose";
pub const DEPENDENCY_KUBE_CLUSTER: &str = "kube_cluster";

pub const LABEL_TITLE: &str = "title";
pub const LABEL_GROUP: &str = "group";
pub const LABEL_DESCRIPTION: &str = "description";
pub const LABEL_CREATED_BY: &str = "created_by";
pub const LABEL_CREATED_BY_EMAIL: &str = "created_by_email";
pub const LABEL_UPDATED_BY: &str = "updated_by";
pub const LABEL_UPDATED_BY_EMAIL: &str = "updated_by_email";

const RESERVED_LABELS: [&str; 7] = [
    LABEL_TITLE,
    LABEL_GROUP,
    LABEL_DESCRIPTION,
    LABEL_CREATED_BY,
    LABEL_CREATED_BY_EMAIL,
    LABEL_UPDATED_BY,
    LABEL_UPDATED_BY_EMAIL,
];

/// Typed encoding of `spec.configs` for firehose resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirehoseResourceConfig {
    pub replicas: u32,
    #[serde(default)]
    pub deployment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_values: Option<ChartValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<DateTime<Utc>>,
    pub env_variables: EnvVars,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartValues {
    pub image_tag: String,
}

/// Lowercase, runs of non-alphanumerics become one `-`, edges trimmed
pub fn slugify(s: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));
    let lower = s.to_lowercase();
    re.replace_all(&lower, "-").trim_matches('-').to_string()
}

pub fn to_resource(firehose: &Firehose, project: &str) -> Result<Resource> {
    let name = if firehose.name.is_empty() {
        slugify(&firehose.title)
    } else {
        firehose.name.clone()
    };

    let mut labels = firehose.labels.clone();
    labels.insert(LABEL_TITLE.to_string(), firehose.title.clone());
    labels.insert(LABEL_GROUP.to_string(), firehose.group.clone());
    labels.insert(LABEL_DESCRIPTION.to_string(), firehose.description.clone());
    let audit = &firehose.metadata;
    labels.insert(LABEL_CREATED_BY.to_string(), audit.created_by.id.clone());
    labels.insert(
        LABEL_CREATED_BY_EMAIL.to_string(),
        audit.created_by.email.clone(),
    );
    labels.insert(LABEL_UPDATED_BY.to_string(), audit.updated_by.id.clone());
    labels.insert(
        LABEL_UPDATED_BY_EMAIL.to_string(),
        audit.updated_by.email.clone(),
    );

    let config = &firehose.config;
    let configs = FirehoseResourceConfig {
        replicas: config.replicas,
        deployment_id: config.deployment_id.clone(),
        chart_values: (!config.image_tag.is_empty()).then(|| ChartValues {
            image_tag: config.image_tag.clone(),
        }),
        stop_time: config.stop_time,
        env_variables: config.env_vars.clone(),
    };
    let configs = serde_json::to_value(&configs)
        .map_err(|e| Error::internal(format!("failed to encode firehose config: {}", e)))?;

    Ok(Resource {
        urn: firehose.urn.clone(),
        kind: KIND_FIREHOSE.to_string(),
        name,
        project: project.to_string(),
        labels,
        spec: ResourceSpec {
            configs: Some(configs),
            dependencies: vec![ResourceDependency {
                key: DEPENDENCY_KUBE_CLUSTER.to_string(),
                value: firehose.kube_cluster.clone(),
            }],
        },
        state: ResourceState::default(),
        created_at: firehose.created_at,
        updated_at: firehose.updated_at,
    })
}

/// Decode a resource. With `only_meta` the spec configs and state are not
/// touched, which keeps listing cheap and tolerant of odd specs.
pub fn from_resource(resource: &Resource, only_meta: bool) -> Result<Firehose> {
    let label = |key: &str| resource.labels.get(key).cloned().unwrap_or_default();

    let kube_cluster = resource
        .spec
        .dependencies
        .iter()
        .find(|d| d.key == DEPENDENCY_KUBE_CLUSTER)
        .map(|d| d.value.clone())
        .unwrap_or_default();

    let labels = resource
        .labels
        .iter()
        .filter(|(k, _)| !RESERVED_LABELS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut firehose = Firehose {
        urn: resource.urn.clone(),
        name: resource.name.clone(),
        title: label(LABEL_TITLE),
        description: label(LABEL_DESCRIPTION),
        project: resource.project.clone(),
        group: label(LABEL_GROUP),
        kube_cluster,
        labels,
        config: FirehoseConfig::default(),
        state: FirehoseState::default(),
        metadata: AuditMetadata {
            created_by: UserRef {
                id: label(LABEL_CREATED_BY),
                email: label(LABEL_CREATED_BY_EMAIL),
            },
            updated_by: UserRef {
                id: label(LABEL_UPDATED_BY),
                email: label(LABEL_UPDATED_BY_EMAIL),
            },
        },
        created_at: resource.created_at,
        updated_at: resource.updated_at,
    };

    if only_meta {
        return Ok(firehose);
    }

    let configs = resource
        .spec
        .configs
        .as_ref()
        .filter(|v| !v.is_null())
        .ok_or_else(|| Error::internal(format!("resource {} has no configs", resource.urn)))?;
    let decoded: FirehoseResourceConfig = serde_json::from_value(configs.clone())
        .map_err(|e| Error::internal(format!("malformed configs on {}: {}", resource.urn, e)))?;

    firehose.config = FirehoseConfig {
        replicas: decoded.replicas,
        deployment_id: decoded.deployment_id,
        image_tag: decoded
            .chart_values
            .map(|c| c.image_tag)
            .unwrap_or_default(),
        stop_time: decoded.stop_time,
        env_vars: decoded.env_variables,
    };

    let output = match &resource.state.output {
        None | Some(Value::Null) => Default::default(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(Error::internal(format!(
                "malformed state output on {}: expected object, got {}",
                resource.urn, other
            )))
        }
    };
    firehose.state = FirehoseState {
        status: resource.state.status.clone(),
        output,
    };

    Ok(firehose)
}

//! Revision history: an audit trail rebuilt from the orchestrator's
//! revision list by diffing each spec against the one before it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::client::{OrchestratorClient, ResourceSpec, Revision};
use crate::error::{Error, Result};
use crate::request::RequestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffOp {
    Added,
    Removed,
    Changed,
}

/// One difference between two specs, addressed by a dotted path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub path: String,
    pub op: DiffOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionDiff {
    pub labels: BTreeMap<String, String>,
    pub reason: String,
    pub diff: Vec<DiffEntry>,
    pub updated_at: DateTime<Utc>,
}

/// Deterministic JSON form of a value: object keys sorted at every level
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), canonicalize(&obj[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

pub fn canonical_spec(spec: &ResourceSpec) -> Result<Value> {
    serde_json::to_value(spec)
        .map(|v| canonicalize(&v))
        .map_err(|e| Error::internal(format!("failed to encode revision spec: {}", e)))
}

fn join(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", base, key)
    }
}

/// Structural diff of `new` against `old`. Objects are compared by key,
/// arrays element by element.
pub fn diff(old: &Value, new: &Value) -> Vec<DiffEntry> {
    fn walk(path: &str, old: &Value, new: &Value, out: &mut Vec<DiffEntry>) {
        if old == new {
            return;
        }
        match (old, new) {
            (Value::Object(oo), Value::Object(no)) => {
                let mut keys: Vec<&String> = oo.keys().chain(no.keys()).collect();
                keys.sort();
                keys.dedup();
                for key in keys {
                    let p = join(path, key);
                    match (oo.get(key.as_str()), no.get(key.as_str())) {
                        (Some(ov), Some(nv)) => walk(&p, ov, nv, out),
                        (None, Some(nv)) => out.push(DiffEntry {
                            path: p,
                            op: DiffOp::Added,
                            old: None,
                            new: Some(nv.clone()),
                        }),
                        (Some(ov), None) => out.push(DiffEntry {
                            path: p,
                            op: DiffOp::Removed,
                            old: Some(ov.clone()),
                            new: None,
                        }),
                        (None, None) => {}
                    }
                }
            }
            (Value::Array(oa), Value::Array(na)) => {
                for i in 0..oa.len().max(na.len()) {
                    let p = format!("{}[{}]", path, i);
                    match (oa.get(i), na.get(i)) {
                        (Some(ov), Some(nv)) => walk(&p, ov, nv, out),
                        (None, Some(nv)) => out.push(DiffEntry {
                            path: p,
                            op: DiffOp::Added,
                            old: None,
                            new: Some(nv.clone()),
                        }),
                        (Some(ov), None) => out.push(DiffEntry {
                            path: p,
                            op: DiffOp::Removed,
                            old: Some(ov.clone()),
                            new: None,
                        }),
                        (None, None) => {}
                    }
                }
            }
            (ov, nv) => out.push(DiffEntry {
                path: path.to_string(),
                op: DiffOp::Changed,
                old: Some(ov.clone()),
                new: Some(nv.clone()),
            }),
        }
    }

    let mut out = Vec::new();
    walk("", &canonicalize(old), &canonicalize(new), &mut out);
    out
}

/// One record per revision, in order; the first is diffed against `{}`
pub fn build_history(revisions: &[Revision]) -> Result<Vec<RevisionDiff>> {
    let mut previous = Value::Object(Map::new());
    let mut history = Vec::with_capacity(revisions.len());
    for revision in revisions {
        let current = canonical_spec(&revision.spec)?;
        history.push(RevisionDiff {
            labels: revision.labels.clone(),
            reason: revision.reason.clone(),
            diff: diff(&previous, &current),
            updated_at: revision.created_at,
        });
        previous = current;
    }
    Ok(history)
}

pub async fn fetch_history(
    ctx: &RequestContext,
    orchestrator: &dyn OrchestratorClient,
    urn: &str,
) -> Result<Vec<RevisionDiff>> {
    let revisions = ctx
        .guard(orchestrator.get_resource_revisions(urn))
        .await?
        .map_err(|e| Error::from_orchestrator(e, urn))?;
    build_history(&revisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::orchestrator::mock::MockOrchestrator;
    use crate::client::ResourceDependency;
    use crate::request::Caller;
    use serde_json::json;

    fn revision(id: &str, configs: Value, reason: &str) -> Revision {
        Revision {
            id: id.into(),
            urn: "urn:fh".into(),
            labels: [("updated_by".to_string(), "u1".to_string())]
                .into_iter()
                .collect(),
            reason: reason.into(),
            spec: ResourceSpec {
                configs: Some(configs),
                dependencies: vec![ResourceDependency {
                    key: "kube_cluster".into(),
                    value: "urn:cluster:prod".into(),
                }],
            },
            created_at: "2024-01-01T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_diff_reports_paths() {
        let old = json!({"a": 1, "b": {"x": 1}, "c": [1, 2, 3], "gone": true});
        let new = json!({"a": 2, "b": {"x": 1, "y": 2}, "c": [1, 9]});
        let entries = diff(&old, &new);
        let summary: Vec<(&str, DiffOp)> = entries.iter().map(|e| (e.path.as_str(), e.op)).collect();
        assert_eq!(
            summary,
            vec![
                ("a", DiffOp::Changed),
                ("b.y", DiffOp::Added),
                ("c[1]", DiffOp::Changed),
                ("c[2]", DiffOp::Removed),
                ("gone", DiffOp::Removed),
            ]
        );
        assert_eq!(entries[0].old, Some(json!(1)));
        assert_eq!(entries[0].new, Some(json!(2)));
    }

    #[test]
    fn test_self_diff_is_empty() {
        let spec = json!({"replicas": 2, "env": {"A": "1", "B": [1, {"c": null}]}});
        assert!(diff(&spec, &spec).is_empty());
    }

    #[test]
    fn test_diff_is_key_order_independent() {
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": {"p": 1, "q": 2}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": {"q": 2, "p": 1}, "x": 1}"#).unwrap();
        assert!(diff(&a, &b).is_empty());

        let c: Value = serde_json::from_str(r#"{"y": {"q": 3, "p": 1}, "x": 1}"#).unwrap();
        assert_eq!(diff(&a, &c), diff(&b, &c));
    }

    #[test]
    fn test_history_one_record_per_revision() {
        let revisions = vec![
            revision("1", json!({"replicas": 1}), "create"),
            revision("2", json!({"replicas": 2}), "scale"),
            revision("3", json!({"replicas": 2}), "restart"),
        ];
        let history = build_history(&revisions).unwrap();
        assert_eq!(history.len(), 3);

        // first record is diffed against the empty object
        let first: Vec<&str> = history[0].diff.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(first, vec!["configs", "dependencies"]);
        assert!(history[0].diff.iter().all(|e| e.op == DiffOp::Added));

        assert_eq!(history[1].reason, "scale");
        assert_eq!(history[1].diff.len(), 1);
        assert_eq!(history[1].diff[0].path, "configs.replicas");
        assert_eq!(history[1].diff[0].op, DiffOp::Changed);

        assert!(history[2].diff.is_empty());
        assert_eq!(history[2].labels["updated_by"], "u1");
    }

    #[test]
    fn test_empty_history() {
        assert!(build_history(&[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_history_not_found() {
        let orch = MockOrchestrator::new();
        let ctx = RequestContext::new(Caller::default());
        let err = fetch_history(&ctx, &orch, "urn:missing").await.unwrap_err();
        assert_eq!(err, Error::firehose_not_found("urn:missing"));
    }

    #[tokio::test]
    async fn test_fetch_history() {
        let orch = MockOrchestrator::new().with_revisions(
            "urn:fh",
            vec![
                revision("1", json!({"replicas": 1}), "create"),
                revision("2", json!({"replicas": 3}), "scale"),
            ],
        );
        let ctx = RequestContext::new(Caller::default());
        let history = fetch_history(&ctx, &orch, "urn:fh").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].diff[0].new, Some(json!(3)));
    }
}

//! Display formatting for CLI output
//!
//! SBIO pattern: Pure functions that format data for display

use serde_json::Value;

use super::commands::{CommandError, CommandResult};
use crate::client::Resource;
use crate::firehose::revisions::{DiffEntry, DiffOp};

fn compact(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// One line per entry: `+` added, `-` removed, `~` changed
pub fn format_diff(entries: &[DiffEntry]) -> String {
    if entries.is_empty() {
        return "No differences.\n".to_string();
    }

    let mut output = String::new();
    for entry in entries {
        let line = match entry.op {
            DiffOp::Added => format!("+ {}: {}", entry.path, compact(&entry.new)),
            DiffOp::Removed => format!("- {}: {}", entry.path, compact(&entry.old)),
            DiffOp::Changed => format!(
                "~ {}: {} -> {}",
                entry.path,
                compact(&entry.old),
                compact(&entry.new)
            ),
        };
        output.push_str(&line);
        output.push('\n');
    }
    output.push_str(&format!("\n{} change(s)\n", entries.len()));
    output
}

pub fn format_resource(resource: &Resource, json: bool) -> CommandResult<String> {
    if json {
        Ok(serde_json::to_string_pretty(resource)?)
    } else {
        serde_yaml::to_string(resource).map_err(|e| CommandError::Manifest(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_diff_empty() {
        assert_eq!(format_diff(&[]), "No differences.\n");
    }

    #[test]
    fn test_format_diff_lines() {
        let entries = crate::firehose::revisions::diff(
            &json!({"replicas": 1, "env": {"A": "x"}}),
            &json!({"replicas": 2, "env": {"B": "y"}}),
        );
        let output = format_diff(&entries);
        assert!(output.contains("- env.A: x\n"));
        assert!(output.contains("+ env.B: y\n"));
        assert!(output.contains("~ replicas: 1 -> 2\n"));
        assert!(output.ends_with("3 change(s)\n"));
    }

    #[test]
    fn test_format_resource() {
        let resource = Resource {
            kind: "firehose".into(),
            name: "orders".into(),
            project: "p".into(),
            ..Default::default()
        };
        let yaml = format_resource(&resource, false).unwrap();
        assert!(yaml.contains("kind: firehose"));
        let json = format_resource(&resource, true).unwrap();
        assert!(json.contains("\"name\": \"orders\""));
    }
}

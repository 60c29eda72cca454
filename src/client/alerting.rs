//! Alerting service contract
//!
//! Rules are grouped by `group_name`, which for firehoses is the release
//! name of the deployment, and scoped to a provider namespace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RpcError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVariable {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, rename = "type")]
    pub var_type: String,
    #[serde(default)]
    pub description: String,
}

impl RuleVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            var_type: "string".to_string(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: u64,
    pub name: String,
    pub namespace: String,
    pub group_name: String,
    pub template: String,
    pub enabled: bool,
    #[serde(default)]
    pub variables: Vec<RuleVariable>,
    pub provider_namespace: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRuleRequest {
    pub namespace: String,
    pub group_name: String,
    pub template: String,
    pub enabled: bool,
    pub variables: Vec<RuleVariable>,
    pub provider_namespace: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertNamespace {
    pub id: u64,
    pub urn: String,
    pub name: String,
    pub provider: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub resource_name: String,
    pub metric_name: String,
    pub metric_value: String,
    pub severity: String,
    pub rule: String,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(default, rename = "type")]
    pub var_type: String,
    #[serde(default)]
    pub default: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertTemplate {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
}

#[async_trait]
pub trait AlertingClient: Send + Sync {
    async fn list_rules(
        &self,
        namespace: &str,
        provider_namespace: u64,
        group_name: &str,
    ) -> Result<Vec<AlertRule>, RpcError>;

    async fn update_rule(&self, request: UpdateRuleRequest) -> Result<AlertRule, RpcError>;

    async fn list_namespaces(&self) -> Result<Vec<AlertNamespace>, RpcError>;

    async fn list_alerts(
        &self,
        provider_type: &str,
        provider_id: u64,
        resource: &str,
    ) -> Result<Vec<Alert>, RpcError>;

    async fn list_templates(&self, tag: &str) -> Result<Vec<AlertTemplate>, RpcError>;

    async fn get_template(&self, name: &str) -> Result<AlertTemplate, RpcError>;
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::client::CallLog;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// In-memory rule store keyed by (namespace, provider namespace, group, template)
    #[derive(Default)]
    pub struct MockAlerting {
        rules: Mutex<Vec<AlertRule>>,
        updates: Mutex<Vec<UpdateRuleRequest>>,
        alerts: Vec<Alert>,
        templates: Vec<AlertTemplate>,
        namespaces: Vec<AlertNamespace>,
        update_error: Mutex<Option<RpcError>>,
        not_found_without_rules: bool,
        next_id: AtomicU64,
        call_log: Option<CallLog>,
    }

    impl MockAlerting {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_call_log(mut self, log: CallLog) -> Self {
            self.call_log = Some(log);
            self
        }

        pub fn with_rules(self, rules: Vec<AlertRule>) -> Self {
            *self.rules.lock().unwrap() = rules;
            self
        }

        pub fn with_alerts(mut self, alerts: Vec<Alert>) -> Self {
            self.alerts = alerts;
            self
        }

        pub fn with_templates(mut self, templates: Vec<AlertTemplate>) -> Self {
            self.templates = templates;
            self
        }

        pub fn with_namespaces(mut self, namespaces: Vec<AlertNamespace>) -> Self {
            self.namespaces = namespaces;
            self
        }

        /// Answer `list_rules` with NotFound while a group has no rules
        pub fn not_found_without_rules(mut self) -> Self {
            self.not_found_without_rules = true;
            self
        }

        pub fn fail_update(&self, err: RpcError) {
            *self.update_error.lock().unwrap() = Some(err);
        }

        pub fn updates(&self) -> Vec<UpdateRuleRequest> {
            self.updates.lock().unwrap().clone()
        }

        pub fn rules(&self) -> Vec<AlertRule> {
            self.rules.lock().unwrap().clone()
        }

        fn record(&self, entry: String) {
            if let Some(log) = &self.call_log {
                log.lock().unwrap().push(entry);
            }
        }
    }

    #[async_trait]
    impl AlertingClient for MockAlerting {
        async fn list_rules(
            &self,
            namespace: &str,
            provider_namespace: u64,
            group_name: &str,
        ) -> Result<Vec<AlertRule>, RpcError> {
            self.record(format!("alerting.list_rules:{}", group_name));
            let rules: Vec<AlertRule> = self
                .rules
                .lock()
                .unwrap()
                .iter()
                .filter(|r| {
                    r.namespace == namespace
                        && r.provider_namespace == provider_namespace
                        && r.group_name == group_name
                })
                .cloned()
                .collect();
            if rules.is_empty() && self.not_found_without_rules {
                return Err(RpcError::not_found(format!("no rules for {}", group_name)));
            }
            Ok(rules)
        }

        async fn update_rule(&self, request: UpdateRuleRequest) -> Result<AlertRule, RpcError> {
            self.record(format!(
                "alerting.update:{}:{}",
                request.template, request.enabled
            ));
            if let Some(err) = self.update_error.lock().unwrap().take() {
                return Err(err);
            }
            self.updates.lock().unwrap().push(request.clone());

            let mut rules = self.rules.lock().unwrap();
            let existing = rules.iter_mut().find(|r| {
                r.namespace == request.namespace
                    && r.provider_namespace == request.provider_namespace
                    && r.group_name == request.group_name
                    && r.template == request.template
            });
            let rule = match existing {
                Some(rule) => {
                    rule.enabled = request.enabled;
                    rule.variables = request.variables;
                    rule.updated_at = Some(Utc::now());
                    rule.clone()
                }
                None => {
                    let rule = AlertRule {
                        id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                        name: format!("{}_{}", request.group_name, request.template),
                        namespace: request.namespace,
                        group_name: request.group_name,
                        template: request.template,
                        enabled: request.enabled,
                        variables: request.variables,
                        provider_namespace: request.provider_namespace,
                        updated_at: Some(Utc::now()),
                    };
                    rules.push(rule.clone());
                    rule
                }
            };
            Ok(rule)
        }

        async fn list_namespaces(&self) -> Result<Vec<AlertNamespace>, RpcError> {
            Ok(self.namespaces.clone())
        }

        async fn list_alerts(
            &self,
            provider_type: &str,
            provider_id: u64,
            resource: &str,
        ) -> Result<Vec<Alert>, RpcError> {
            self.record(format!(
                "alerting.list_alerts:{}:{}:{}",
                provider_type, provider_id, resource
            ));
            Ok(self
                .alerts
                .iter()
                .filter(|a| a.resource_name == resource)
                .cloned()
                .collect())
        }

        async fn list_templates(&self, tag: &str) -> Result<Vec<AlertTemplate>, RpcError> {
            Ok(self
                .templates
                .iter()
                .filter(|t| t.tags.iter().any(|t| t == tag))
                .cloned()
                .collect())
        }

        async fn get_template(&self, name: &str) -> Result<AlertTemplate, RpcError> {
            self.templates
                .iter()
                .find(|t| t.name == name)
                .cloned()
                .ok_or_else(|| RpcError::not_found(format!("template {} not found", name)))
        }
    }
}

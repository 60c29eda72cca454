//! Alert policy synchronization
//!
//! A firehose's alert rules live in the alerting service, grouped under the
//! firehose's release name. Three variables (`name`, `team`, `entity`) are
//! owned by this layer: they are hidden from callers and always re-injected
//! before anything is written.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{
    Alert, AlertRule, AlertTemplate, AlertingClient, RpcCode, RuleVariable, UpdateRuleRequest,
};
use crate::config::AlertingSettings;
use crate::error::{Error, Result};
use crate::request::RequestContext;

pub const VAR_NAME: &str = "name";
pub const VAR_TEAM: &str = "team";
pub const VAR_ENTITY: &str = "entity";

pub const SUPPLIED_VARIABLES: [&str; 3] = [VAR_NAME, VAR_TEAM, VAR_ENTITY];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub template: String,
    pub enabled: bool,
    #[serde(default)]
    pub variables: Vec<RuleVariable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    /// Release name of the firehose
    pub resource: String,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

/// Everything needed to address and fill a firehose's rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertTarget {
    pub resource: String,
    pub provider_namespace: u64,
    pub team: String,
    pub entity: String,
}

fn is_supplied(name: &str) -> bool {
    SUPPLIED_VARIABLES.contains(&name)
}

/// Drop the supplied variables from a rule's visible variable set
pub fn strip_supplied(variables: &[RuleVariable]) -> Vec<RuleVariable> {
    variables
        .iter()
        .filter(|v| !is_supplied(&v.name))
        .cloned()
        .collect()
}

/// Replace any caller values of the supplied variables with the target's
pub fn inject_supplied(variables: &[RuleVariable], target: &AlertTarget) -> Vec<RuleVariable> {
    let mut out = strip_supplied(variables);
    out.push(RuleVariable::new(VAR_NAME, target.resource.as_str()));
    out.push(RuleVariable::new(VAR_TEAM, target.team.as_str()));
    out.push(RuleVariable::new(VAR_ENTITY, target.entity.as_str()));
    out
}

fn policy_from_rules(resource: &str, rules: Vec<AlertRule>) -> AlertPolicy {
    AlertPolicy {
        resource: resource.to_string(),
        rules: rules
            .into_iter()
            .map(|r| PolicyRule {
                variables: strip_supplied(&r.variables),
                template: r.template,
                enabled: r.enabled,
            })
            .collect(),
    }
}

fn policy_not_found(resource: &str) -> Error {
    Error::NotFound {
        what: "alert policy",
        id: resource.to_string(),
    }
}

pub struct AlertSynchronizer<'a> {
    alerting: &'a dyn AlertingClient,
    settings: &'a AlertingSettings,
}

impl<'a> AlertSynchronizer<'a> {
    pub fn new(alerting: &'a dyn AlertingClient, settings: &'a AlertingSettings) -> Self {
        Self { alerting, settings }
    }

    async fn fetch_rules(
        &self,
        ctx: &RequestContext,
        target: &AlertTarget,
    ) -> Result<Vec<AlertRule>> {
        let listed = ctx
            .guard(self.alerting.list_rules(
                &self.settings.rule_namespace,
                target.provider_namespace,
                &target.resource,
            ))
            .await?;
        match listed {
            Ok(rules) => Ok(rules),
            // no policy yet for this resource
            Err(e) if e.code == RpcCode::NotFound => Ok(Vec::new()),
            Err(e) => Err(Error::from_rpc(e, "alert policy", &target.resource)),
        }
    }

    /// Current policy with supplied variables hidden
    pub async fn get_policy(
        &self,
        ctx: &RequestContext,
        target: &AlertTarget,
    ) -> Result<AlertPolicy> {
        let rules = self.fetch_rules(ctx, target).await?;
        if rules.is_empty() {
            return Err(policy_not_found(&target.resource));
        }
        Ok(policy_from_rules(&target.resource, rules))
    }

    /// Replace the rule set of `target` with `policy`.
    ///
    /// Every currently enabled rule is disabled first so rules missing from
    /// the new set do not linger enabled. An empty policy therefore just
    /// switches everything off.
    pub async fn upsert_policy(
        &self,
        ctx: &RequestContext,
        target: &AlertTarget,
        policy: &AlertPolicy,
    ) -> Result<AlertPolicy> {
        for rule in &policy.rules {
            self.ensure_template(ctx, &rule.template).await?;
        }

        let existing = self.fetch_rules(ctx, target).await?;
        for rule in existing.iter().filter(|r| r.enabled) {
            debug!(resource = %target.resource, template = %rule.template, "disabling alert rule");
            self.update(
                ctx,
                target,
                UpdateRuleRequest {
                    namespace: self.settings.rule_namespace.clone(),
                    group_name: target.resource.clone(),
                    template: rule.template.clone(),
                    enabled: false,
                    variables: inject_supplied(&rule.variables, target),
                    provider_namespace: target.provider_namespace,
                },
            )
            .await?;
        }

        for rule in &policy.rules {
            self.update(
                ctx,
                target,
                UpdateRuleRequest {
                    namespace: self.settings.rule_namespace.clone(),
                    group_name: target.resource.clone(),
                    template: rule.template.clone(),
                    enabled: rule.enabled,
                    variables: inject_supplied(&rule.variables, target),
                    provider_namespace: target.provider_namespace,
                },
            )
            .await?;
        }

        info!(
            resource = %target.resource,
            disabled = existing.iter().filter(|r| r.enabled).count(),
            applied = policy.rules.len(),
            "alert policy synchronized"
        );

        let rules = self.fetch_rules(ctx, target).await?;
        Ok(policy_from_rules(&target.resource, rules))
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        target: &AlertTarget,
        request: UpdateRuleRequest,
    ) -> Result<()> {
        let template = request.template.clone();
        ctx.guard(self.alerting.update_rule(request))
            .await?
            .map(|_| ())
            .map_err(|e| match e.code {
                RpcCode::InvalidArgument => Error::Validation(e.message),
                _ => Error::internal(format!(
                    "failed to update alert rule '{}' of {}: {}",
                    template, target.resource, e
                )),
            })
    }

    async fn ensure_template(&self, ctx: &RequestContext, name: &str) -> Result<AlertTemplate> {
        ctx.guard(self.alerting.get_template(name))
            .await?
            .map_err(|e| match e.code {
                RpcCode::NotFound => Error::validation(format!("unknown alert template '{}'", name)),
                _ => Error::from_rpc(e, "alert template", name),
            })
    }

    /// Alerting provider backing a provider namespace
    pub async fn provider_for_namespace(&self, ctx: &RequestContext, namespace: u64) -> Result<u64> {
        let namespaces = ctx
            .guard(self.alerting.list_namespaces())
            .await?
            .map_err(|e| Error::internal(format!("failed to list alert namespaces: {}", e)))?;
        namespaces
            .into_iter()
            .find(|ns| ns.id == namespace)
            .map(|ns| ns.provider)
            .ok_or_else(|| Error::internal(format!("alert namespace {} is not registered", namespace)))
    }

    pub async fn list_alerts(
        &self,
        ctx: &RequestContext,
        provider_id: u64,
        resource: &str,
    ) -> Result<Vec<Alert>> {
        ctx.guard(
            self.alerting
                .list_alerts(&self.settings.provider_type, provider_id, resource),
        )
        .await?
        .map_err(|e| Error::from_rpc(e, "alerts", resource))
    }

    pub async fn list_templates(&self, ctx: &RequestContext) -> Result<Vec<AlertTemplate>> {
        ctx.guard(self.alerting.list_templates(&self.settings.template_tag))
            .await?
            .map_err(|e| Error::internal(format!("failed to list alert templates: {}", e)))
    }
}

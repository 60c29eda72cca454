//! Lifecycle actions applied through the orchestrator
//!
//! Every action follows the same sequence: validate, fetch the resource,
//! shape the action parameters, submit one apply-action call and translate
//! the orchestrator's status. Status itself is opaque here; whether an
//! action is legal in the current state is the orchestrator's call.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::mapper::{self, KIND_FIREHOSE, LABEL_UPDATED_BY, LABEL_UPDATED_BY_EMAIL};
use super::model::{Firehose, SinkType};
use crate::client::{ApplyActionRequest, OrchestratorClient, Resource};
use crate::config::FirehoseSettings;
use crate::error::{Error, Result};
use crate::request::RequestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResetTarget {
    Earliest,
    Latest,
    Datetime,
}

/// Where consumption restarts after an offset reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOffset {
    Earliest,
    Latest,
    Datetime(DateTime<Utc>),
}

impl ResetOffset {
    pub fn target(&self) -> ResetTarget {
        match self {
            ResetOffset::Earliest => ResetTarget::Earliest,
            ResetOffset::Latest => ResetTarget::Latest,
            ResetOffset::Datetime(_) => ResetTarget::Datetime,
        }
    }
}

/// Reset request as received from a caller, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOffsetRequest {
    pub to: String,
    #[serde(default)]
    pub datetime: Option<String>,
}

impl ResetOffsetRequest {
    pub fn parse(&self) -> Result<ResetOffset> {
        match self.to.trim().to_ascii_uppercase().as_str() {
            "EARLIEST" => Ok(ResetOffset::Earliest),
            "LATEST" => Ok(ResetOffset::Latest),
            "DATETIME" => {
                let raw = self
                    .datetime
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| Error::validation("datetime is required when resetting to DATETIME"))?;
                let at = DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| Error::validation(format!("invalid datetime '{}': {}", raw, e)))?;
                Ok(ResetOffset::Datetime(at.with_timezone(&Utc)))
            }
            other => Err(Error::validation(format!(
                "invalid reset target '{}': expected EARLIEST, LATEST or DATETIME",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `stop_time` only matters for the log sink; `None` means the default TTL
    Start { stop_time: Option<DateTime<Utc>> },
    Stop,
    Scale { replicas: u32 },
    Upgrade,
    ResetOffset(ResetOffset),
}

impl Action {
    /// Action name understood by the orchestrator
    pub fn name(&self) -> &'static str {
        match self {
            Action::Start { .. } => "start",
            Action::Stop => "stop",
            Action::Scale { .. } => "scale",
            Action::Upgrade => "upgrade",
            Action::ResetOffset(_) => "reset",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Action::Scale { replicas: 0 } => Err(Error::validation("replicas must be at least 1")),
            _ => Ok(()),
        }
    }
}

/// Parameters sent with an apply-action call, one shape per action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionParams {
    Start {
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_time: Option<DateTime<Utc>>,
    },
    Scale {
        replicas: u32,
    },
    Reset {
        to: ResetTarget,
        #[serde(skip_serializing_if = "Option::is_none")]
        datetime: Option<DateTime<Utc>>,
    },
    Empty {},
}

impl ActionParams {
    pub fn encode(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| Error::internal(format!("failed to encode action params: {}", e)))
    }
}

/// Shape the parameters of `action` for `firehose`, evaluated at `now`
pub fn shape_params(
    action: &Action,
    firehose: &Firehose,
    settings: &FirehoseSettings,
    now: DateTime<Utc>,
) -> Result<ActionParams> {
    let params = match *action {
        Action::Start { stop_time } => {
            let is_log_sink = matches!(firehose.config.sink_type(), Ok(SinkType::Log));
            let stop_time = match (is_log_sink, stop_time) {
                (false, _) => None,
                (true, Some(at)) => Some(at),
                (true, None) => Some(default_stop_time(now, settings.log_sink_ttl_hours)?),
            };
            ActionParams::Start { stop_time }
        }
        Action::Scale { replicas } => ActionParams::Scale { replicas },
        Action::ResetOffset(reset) => ActionParams::Reset {
            to: reset.target(),
            datetime: match reset {
                ResetOffset::Datetime(at) => Some(at),
                _ => None,
            },
        },
        Action::Stop | Action::Upgrade => ActionParams::Empty {},
    };
    Ok(params)
}

fn default_stop_time(now: DateTime<Utc>, ttl_hours: i64) -> Result<DateTime<Utc>> {
    Duration::try_hours(ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| Error::internal(format!("log sink ttl of {} hours is out of range", ttl_hours)))
}

pub struct ActionDispatcher<'a> {
    orchestrator: &'a dyn OrchestratorClient,
    settings: &'a FirehoseSettings,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(orchestrator: &'a dyn OrchestratorClient, settings: &'a FirehoseSettings) -> Self {
        Self {
            orchestrator,
            settings,
        }
    }

    /// Fetch a firehose resource; a resource of another kind is not found
    pub async fn fetch(&self, ctx: &RequestContext, urn: &str) -> Result<Resource> {
        let resource = ctx
            .guard(self.orchestrator.get_resource(urn))
            .await?
            .map_err(|e| Error::from_orchestrator(e, urn))?;
        if resource.kind != KIND_FIREHOSE {
            debug!(urn, kind = %resource.kind, "resource is not a firehose");
            return Err(Error::firehose_not_found(urn));
        }
        Ok(resource)
    }

    pub async fn dispatch(&self, ctx: &RequestContext, urn: &str, action: Action) -> Result<Firehose> {
        action.validate()?;

        let resource = self.fetch(ctx, urn).await?;
        let firehose = mapper::from_resource(&resource, false)?;

        let params = shape_params(&action, &firehose, self.settings, Utc::now())?.encode()?;

        let mut labels = resource.labels.clone();
        labels.insert(LABEL_UPDATED_BY.to_string(), ctx.caller.user_id.clone());
        labels.insert(LABEL_UPDATED_BY_EMAIL.to_string(), ctx.caller.email.clone());

        info!(urn, action = action.name(), "applying action");
        let request = ApplyActionRequest {
            urn: urn.to_string(),
            action: action.name().to_string(),
            params,
            labels,
        };
        let updated = ctx
            .guard(self.orchestrator.apply_action(request, &ctx.caller))
            .await?
            .map_err(|e| Error::from_orchestrator(e, urn))?;

        mapper::from_resource(&updated, false)
    }
}

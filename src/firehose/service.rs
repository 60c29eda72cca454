//! The exposed operations: one async function per firehose use case
//!
//! [`FirehoseService`] wires the collaborators to the synthesizer, mapper,
//! dispatcher, alert synchronizer and history builder. It holds no state of
//! its own beyond the shared clients and settings.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use tracing::{info, warn};

use super::action::{Action, ActionDispatcher, ResetOffsetRequest};
use super::alerts::{AlertPolicy, AlertSynchronizer, AlertTarget};
use super::env::{SOURCE_KAFKA_BROKERS, SOURCE_KAFKA_CONSUMER_GROUP_ID};
use super::mapper::{self, KIND_FIREHOSE};
use super::model::{Firehose, FirehoseUpdate, ListFilter, LogFilter, UserRef};
use super::revisions::{self, RevisionDiff};
use super::synth::{ConfigSynthesizer, SynthesisOptions};
use crate::client::{
    Alert, AlertTemplate, AlertingClient, IdentityClient, LogChunk, OrchestratorClient, Project,
    RpcCode, SchemaCatalog, StreamRegistry,
};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::request::RequestContext;

/// Log output of a firehose; ends early when the request is cancelled
pub type FirehoseLogStream = BoxStream<'static, Result<LogChunk>>;

#[derive(Clone)]
pub struct FirehoseService {
    orchestrator: Arc<dyn OrchestratorClient>,
    identity: Arc<dyn IdentityClient>,
    alerting: Arc<dyn AlertingClient>,
    catalog: Arc<dyn SchemaCatalog>,
    registry: Arc<dyn StreamRegistry>,
    settings: Arc<Settings>,
}

impl FirehoseService {
    pub fn new(
        orchestrator: Arc<dyn OrchestratorClient>,
        identity: Arc<dyn IdentityClient>,
        alerting: Arc<dyn AlertingClient>,
        catalog: Arc<dyn SchemaCatalog>,
        registry: Arc<dyn StreamRegistry>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            orchestrator,
            identity,
            alerting,
            catalog,
            registry,
            settings,
        }
    }

    fn synthesizer(&self) -> ConfigSynthesizer<'_> {
        ConfigSynthesizer::new(
            self.registry.as_ref(),
            self.catalog.as_ref(),
            &self.settings.stencil,
            &self.settings.sinks,
        )
    }

    fn dispatcher(&self) -> ActionDispatcher<'_> {
        ActionDispatcher::new(self.orchestrator.as_ref(), &self.settings.firehose)
    }

    fn alerts(&self) -> AlertSynchronizer<'_> {
        AlertSynchronizer::new(self.alerting.as_ref(), &self.settings.alerting)
    }

    // ------------------------------------------------------------------------
    // Identity lookups
    // ------------------------------------------------------------------------

    /// Resolve a project by id, falling back to a slug match over all
    /// projects
    async fn resolve_project(&self, ctx: &RequestContext, id_or_slug: &str) -> Result<Project> {
        match ctx.guard(self.identity.get_project(id_or_slug)).await? {
            Ok(project) => Ok(project),
            Err(e) if e.code == RpcCode::NotFound => {
                let projects = ctx
                    .guard(self.identity.list_projects())
                    .await?
                    .map_err(|e| Error::from_rpc(e, "project", id_or_slug))?;
                projects
                    .into_iter()
                    .find(|p| p.slug == id_or_slug)
                    .ok_or_else(|| Error::NotFound {
                        what: "project",
                        id: id_or_slug.to_string(),
                    })
            }
            Err(e) => Err(Error::from_rpc(e, "project", id_or_slug)),
        }
    }

    async fn alert_target(
        &self,
        ctx: &RequestContext,
        firehose: &Firehose,
        release: &str,
    ) -> Result<AlertTarget> {
        let project = self.resolve_project(ctx, &firehose.project).await?;
        let provider_namespace = alert_namespace(&project)?;
        let entity = project
            .data_source()
            .ok_or_else(|| {
                Error::internal(format!("project {} has no data source configured", project.slug))
            })?
            .to_string();
        let group = ctx
            .guard(self.identity.get_group(&firehose.group))
            .await?
            .map_err(|e| Error::from_rpc(e, "group", &firehose.group))?;

        Ok(AlertTarget {
            resource: release.to_string(),
            provider_namespace,
            team: group.slug,
            entity,
        })
    }

    // ------------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------------

    pub async fn list_firehoses(
        &self,
        ctx: &RequestContext,
        project_id: &str,
        filter: &ListFilter,
    ) -> Result<Vec<Firehose>> {
        let project = self.resolve_project(ctx, project_id).await?;
        let resources = ctx
            .guard(self.orchestrator.list_resources(KIND_FIREHOSE, &project.slug))
            .await?
            .map_err(|e| Error::from_rpc(e, "project", &project.slug))?;

        let only_meta = !filter.needs_config();
        let mut firehoses = Vec::with_capacity(resources.len());
        for resource in &resources {
            let firehose = match mapper::from_resource(resource, only_meta) {
                Ok(firehose) => firehose,
                Err(e) => {
                    warn!(urn = %resource.urn, error = %e, "skipping undecodable firehose");
                    continue;
                }
            };
            if filter.matches(&firehose) {
                firehoses.push(firehose);
            }
        }
        Ok(firehoses)
    }

    pub async fn get_firehose(&self, ctx: &RequestContext, urn: &str) -> Result<Firehose> {
        let resource = self.dispatcher().fetch(ctx, urn).await?;
        mapper::from_resource(&resource, false)
    }

    pub async fn create_firehose(
        &self,
        ctx: &RequestContext,
        project_id: &str,
        mut firehose: Firehose,
    ) -> Result<Firehose> {
        if firehose.title.trim().is_empty() {
            return Err(Error::validation("title is required"));
        }
        if firehose.kube_cluster.trim().is_empty() {
            return Err(Error::validation("kube_cluster is required"));
        }
        if firehose.config.env_vars.topics().is_empty() {
            return Err(Error::validation("SOURCE_KAFKA_TOPIC is required"));
        }
        if firehose.name.is_empty() {
            firehose.name = mapper::slugify(&firehose.title);
        }
        if firehose.name.is_empty() {
            return Err(Error::validation("title must contain alphanumeric characters"));
        }

        let project = self.resolve_project(ctx, project_id).await?;
        firehose.project = project.slug.clone();

        let caller = caller_ref(ctx);
        firehose.metadata.created_by = caller.clone();
        firehose.metadata.updated_by = caller;
        if firehose.config.deployment_id.is_empty() {
            firehose.config.deployment_id = firehose.name.clone();
        }

        let mut env = firehose.config.env_vars.clone();
        env.set_if_absent(
            SOURCE_KAFKA_CONSUMER_GROUP_ID,
            format!("{}-{}", firehose.name, self.settings.firehose.consumer_group_suffix),
        );
        let opts = SynthesisOptions {
            project: project.slug.clone(),
            force_stencil_refresh: false,
        };
        firehose.config.env_vars = self.synthesizer().synthesize(ctx, &env, &opts).await?;

        let resource = mapper::to_resource(&firehose, &project.slug)?;
        let created = ctx
            .guard(self.orchestrator.create_resource(resource, &ctx.caller))
            .await?
            .map_err(|e| Error::from_create(e, &firehose.name))?;

        info!(urn = %created.urn, project = %project.slug, "firehose created");
        mapper::from_resource(&created, false)
    }

    pub async fn update_firehose(
        &self,
        ctx: &RequestContext,
        urn: &str,
        update: FirehoseUpdate,
    ) -> Result<Firehose> {
        let resource = self.dispatcher().fetch(ctx, urn).await?;
        let mut firehose = mapper::from_resource(&resource, false)?;

        let old_stream = firehose.config.env_vars.stream_name().map(str::to_string);
        let old_topic = firehose.config.env_vars.topic().map(str::to_string);
        let old_proto = firehose.config.env_vars.proto_class().map(str::to_string);

        if let Some(title) = update.title {
            firehose.title = title;
        }
        if let Some(description) = update.description {
            firehose.description = description;
        }
        if let Some(group) = update.group {
            firehose.group = group;
        }
        if let Some(replicas) = update.replicas {
            if replicas == 0 {
                return Err(Error::validation("replicas must be at least 1"));
            }
            firehose.config.replicas = replicas;
        }
        if let Some(image_tag) = update.image_tag {
            firehose.config.image_tag = image_tag;
        }
        if let Some(labels) = update.labels {
            firehose.labels.extend(labels);
        }
        let brokers_supplied = update
            .env_vars
            .as_ref()
            .is_some_and(|vars| vars.contains_key(SOURCE_KAFKA_BROKERS));
        if let Some(env_vars) = update.env_vars {
            firehose.config.env_vars.merge(env_vars);
        }

        let env = &mut firehose.config.env_vars;
        if !brokers_supplied && env.stream_name().map(str::to_string) != old_stream {
            env.remove(SOURCE_KAFKA_BROKERS);
        }
        let force_stencil_refresh = env.topic().map(str::to_string) != old_topic
            || env.proto_class().map(str::to_string) != old_proto;

        let opts = SynthesisOptions {
            project: resource.project.clone(),
            force_stencil_refresh,
        };
        firehose.config.env_vars = self
            .synthesizer()
            .synthesize(ctx, &firehose.config.env_vars, &opts)
            .await?;
        firehose.metadata.updated_by = caller_ref(ctx);

        let desired = mapper::to_resource(&firehose, &resource.project)?;
        let updated = ctx
            .guard(self.orchestrator.update_resource(
                urn,
                desired.spec,
                desired.labels,
                &ctx.caller,
            ))
            .await?
            .map_err(|e| Error::from_orchestrator(e, urn))?;

        info!(urn, force_stencil_refresh, "firehose updated");
        mapper::from_resource(&updated, false)
    }

    pub async fn delete_firehose(&self, ctx: &RequestContext, urn: &str) -> Result<()> {
        self.dispatcher().fetch(ctx, urn).await?;
        ctx.guard(self.orchestrator.delete_resource(urn, &ctx.caller))
            .await?
            .map_err(|e| Error::from_orchestrator(e, urn))?;
        info!(urn, "firehose deleted");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Lifecycle actions
    // ------------------------------------------------------------------------

    pub async fn start(
        &self,
        ctx: &RequestContext,
        urn: &str,
        stop_time: Option<DateTime<Utc>>,
    ) -> Result<Firehose> {
        self.dispatcher()
            .dispatch(ctx, urn, Action::Start { stop_time })
            .await
    }

    /// Stop the firehose, then switch off its alert rules.
    ///
    /// The two steps are not atomic: if the alert step fails the firehose
    /// stays stopped and the error is returned.
    pub async fn stop(&self, ctx: &RequestContext, urn: &str) -> Result<Firehose> {
        let firehose = self.dispatcher().dispatch(ctx, urn, Action::Stop).await?;

        let Some(release) = firehose.state.release_name().map(str::to_string) else {
            warn!(urn, "stopped firehose has no release name, skipping alert policy");
            return Ok(firehose);
        };

        let target = self.alert_target(ctx, &firehose, &release).await?;
        match self
            .alerts()
            .upsert_policy(ctx, &target, &AlertPolicy {
                resource: release,
                rules: vec![],
            })
            .await
        {
            Ok(_) => Ok(firehose),
            Err(e) => {
                warn!(urn, error = %e, "firehose stopped but alert policy was not updated");
                Err(e)
            }
        }
    }

    pub async fn scale(&self, ctx: &RequestContext, urn: &str, replicas: u32) -> Result<Firehose> {
        self.dispatcher()
            .dispatch(ctx, urn, Action::Scale { replicas })
            .await
    }

    pub async fn upgrade(&self, ctx: &RequestContext, urn: &str) -> Result<Firehose> {
        self.dispatcher().dispatch(ctx, urn, Action::Upgrade).await
    }

    pub async fn reset_offset(
        &self,
        ctx: &RequestContext,
        urn: &str,
        request: &ResetOffsetRequest,
    ) -> Result<Firehose> {
        let reset = request.parse()?;
        self.dispatcher()
            .dispatch(ctx, urn, Action::ResetOffset(reset))
            .await
    }

    // ------------------------------------------------------------------------
    // History and logs
    // ------------------------------------------------------------------------

    pub async fn get_history(&self, ctx: &RequestContext, urn: &str) -> Result<Vec<RevisionDiff>> {
        revisions::fetch_history(ctx, self.orchestrator.as_ref(), urn).await
    }

    pub async fn get_logs(
        &self,
        ctx: &RequestContext,
        urn: &str,
        filter: &LogFilter,
    ) -> Result<FirehoseLogStream> {
        self.dispatcher().fetch(ctx, urn).await?;
        let stream = ctx
            .guard(self.orchestrator.get_log(urn, filter.to_map()))
            .await?
            .map_err(|e| Error::from_orchestrator(e, urn))?;

        let owned_urn = urn.to_string();
        Ok(stream
            .map(move |chunk| chunk.map_err(|e| Error::from_orchestrator(e, &owned_urn)))
            .take_until(ctx.cancellation().clone().cancelled_owned())
            .boxed())
    }

    // ------------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------------

    pub async fn list_alerts(&self, ctx: &RequestContext, urn: &str) -> Result<Vec<Alert>> {
        let firehose = self.get_firehose(ctx, urn).await?;
        let Some(release) = firehose.state.release_name() else {
            return Ok(vec![]);
        };
        let project = self.resolve_project(ctx, &firehose.project).await?;
        let alerts = self.alerts();
        let provider = alerts
            .provider_for_namespace(ctx, alert_namespace(&project)?)
            .await?;
        alerts.list_alerts(ctx, provider, release).await
    }

    pub async fn get_alert_policy(&self, ctx: &RequestContext, urn: &str) -> Result<AlertPolicy> {
        let firehose = self.get_firehose(ctx, urn).await?;
        let release = firehose.state.release_name().ok_or_else(|| Error::NotFound {
            what: "alert policy",
            id: urn.to_string(),
        })?;
        let target = self.alert_target(ctx, &firehose, release).await?;
        self.alerts().get_policy(ctx, &target).await
    }

    pub async fn upsert_alert_policy(
        &self,
        ctx: &RequestContext,
        urn: &str,
        policy: AlertPolicy,
    ) -> Result<AlertPolicy> {
        let firehose = self.get_firehose(ctx, urn).await?;
        let release = firehose
            .state
            .release_name()
            .ok_or_else(|| Error::validation(format!("firehose {} has not been deployed yet", urn)))?;
        let target = self.alert_target(ctx, &firehose, release).await?;
        let policy = AlertPolicy {
            resource: release.to_string(),
            rules: policy.rules,
        };
        self.alerts().upsert_policy(ctx, &target, &policy).await
    }

    pub async fn list_alert_templates(&self, ctx: &RequestContext) -> Result<Vec<AlertTemplate>> {
        self.alerts().list_templates(ctx).await
    }
}

fn caller_ref(ctx: &RequestContext) -> UserRef {
    UserRef {
        id: ctx.caller.user_id.clone(),
        email: ctx.caller.email.clone(),
    }
}

fn alert_namespace(project: &Project) -> Result<u64> {
    project.alert_namespace().ok_or_else(|| {
        Error::internal(format!(
            "project {} has no alert namespace configured",
            project.slug
        ))
    })
}

//! Firehose resource orchestration
//!
//! Leaves first: [`env`] and [`model`] hold the domain types, [`synth`]
//! derives the deployable config, [`mapper`] converts to and from the
//! orchestrator's resources, [`action`] drives lifecycle actions,
//! [`alerts`] keeps alert rules in step and [`revisions`] rebuilds the
//! change history. [`service`] exposes all of it as one operation per use
//! case.

pub mod action;
pub mod alerts;
pub mod env;
pub mod mapper;
pub mod model;
pub mod revisions;
pub mod service;
pub mod synth;

pub use action::{Action, ActionDispatcher, ResetOffset, ResetOffsetRequest, ResetTarget};
pub use alerts::{AlertPolicy, AlertSynchronizer, AlertTarget, PolicyRule};
pub use env::{EnvVars, ManagedKey};
pub use mapper::{from_resource, slugify, to_resource};
pub use model::{
    AuditMetadata, Firehose, FirehoseConfig, FirehoseState, FirehoseUpdate, ListFilter, LogFilter,
    SinkCategory, SinkType, UserRef,
};
pub use revisions::{DiffEntry, DiffOp, RevisionDiff};
pub use service::{FirehoseLogStream, FirehoseService};
pub use synth::{ConfigSynthesizer, SynthesisOptions};

//! Firehose lifecycle orchestration on top of an external resource
//! orchestrator, with alert rules kept in step.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod firehose;
pub mod request;

pub use error::{Error, ErrorKind, LookupError, Result};
pub use request::{Caller, RequestContext};

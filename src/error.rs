//! Error taxonomy shared by every operation of the orchestration layer
//!
//! Each collaborator boundary translates its own failure type into [`Error`]
//! explicitly; nothing upstream leaks through unclassified.

use thiserror::Error;

use crate::client::{RegistryError, RpcCode, RpcError};

/// Coarse classification consumed by the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

/// Failure while resolving a stream broker address or a schema URL
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("{what} '{key}' not found")]
    NotFound { what: &'static str, key: String },

    #[error("{what} lookup for '{key}' failed: {message}")]
    Internal {
        what: &'static str,
        key: String,
        message: String,
    },
}

impl LookupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LookupError::NotFound { .. } => ErrorKind::NotFound,
            LookupError::Internal { .. } => ErrorKind::Internal,
        }
    }
}

/// Errors returned by every [`crate::firehose::FirehoseService`] operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{what} '{id}' not found")]
    NotFound { what: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    pub fn firehose_not_found(urn: impl Into<String>) -> Self {
        Error::NotFound {
            what: "firehose",
            id: urn.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Lookup(e) => e.kind(),
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Generic translation of a collaborator status. `what`/`id` name the
    /// entity reported when the upstream says not-found.
    pub fn from_rpc(err: RpcError, what: &'static str, id: &str) -> Self {
        match err.code {
            RpcCode::InvalidArgument => Error::Validation(err.message),
            RpcCode::NotFound => Error::NotFound {
                what,
                id: id.to_string(),
            },
            _ => Error::Internal(err.to_string()),
        }
    }

    /// Translation used on every firehose-scoped orchestrator call
    pub fn from_orchestrator(err: RpcError, urn: &str) -> Self {
        Self::from_rpc(err, "firehose", urn)
    }

    /// Creation is the only call where an existing resource is a conflict
    pub fn from_create(err: RpcError, name: &str) -> Self {
        match err.code {
            RpcCode::AlreadyExists => Error::Conflict(err.message),
            _ => Self::from_rpc(err, "firehose", name),
        }
    }
}

impl LookupError {
    pub fn from_registry(err: RegistryError, stream_urn: &str) -> Self {
        match err {
            RegistryError::NotFound => LookupError::NotFound {
                what: "stream",
                key: stream_urn.to_string(),
            },
            other => LookupError::Internal {
                what: "stream",
                key: stream_urn.to_string(),
                message: other.to_string(),
            },
        }
    }

    pub fn from_catalog(err: RpcError, topic: &str) -> Self {
        match err.code {
            RpcCode::NotFound => LookupError::NotFound {
                what: "schema",
                key: topic.to_string(),
            },
            _ => LookupError::Internal {
                what: "schema",
                key: topic.to_string(),
                message: err.to_string(),
            },
        }
    }
}

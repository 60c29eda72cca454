//! Per-request context threaded through every collaborator call
//!
//! Nothing in this crate spawns work of its own: each operation runs inside
//! the caller's task and every remote call is raced against the caller's
//! cancellation token and deadline.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Identity of the user on whose behalf an operation runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: Caller,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(caller: Caller) -> Self {
        Self {
            caller,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Run a collaborator call, aborting it when the request is cancelled or
    /// its deadline passes. The in-flight future is dropped on abort.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = T>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::internal("request cancelled"));
        }

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(Error::internal("request cancelled")),
                    _ = tokio::time::sleep_until(deadline) => Err(Error::internal("deadline exceeded")),
                    out = fut => Ok(out),
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(Error::internal("request cancelled")),
                    out = fut => Ok(out),
                }
            }
        }
    }
}

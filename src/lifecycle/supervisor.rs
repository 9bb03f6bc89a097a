//! Fail-fast task group.
//!
//! # Responsibilities
//! - Run the long-lived loops as one unit of failure
//! - Cancel every sibling when one loop fails
//! - Report the first failure to the caller
//!
//! # Design Decisions
//! - One child token of the caller's token is shared by all tasks;
//!   cancelling the parent is a clean stop, not an error
//! - A panicking task counts as a failure

use std::collections::HashMap;
use std::future::Future;

use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;

pub struct Supervisor {
    token: CancellationToken,
    tasks: JoinSet<Result<(), ProxyError>>,
    names: HashMap<Id, &'static str>,
}

impl Supervisor {
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            tasks: JoinSet::new(),
            names: HashMap::new(),
        }
    }

    /// Token shared by every task in the group.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Start a task that stops when its token is cancelled.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), ProxyError>> + Send + 'static,
    {
        let handle = self.tasks.spawn(task(self.token.clone()));
        self.names.insert(handle.id(), name);
        tracing::debug!(task = name, "Task started");
    }

    /// Wait for every task; return the first error, if any.
    pub async fn wait(mut self) -> Result<(), ProxyError> {
        let mut first: Option<ProxyError> = None;

        while let Some(joined) = self.tasks.join_next_with_id().await {
            let (name, outcome) = match joined {
                Ok((id, outcome)) => (self.name(id), outcome),
                Err(e) => {
                    let name = self.name(e.id());
                    let message = if e.is_panic() { "panicked".to_string() } else { e.to_string() };
                    (name, Err(ProxyError::TaskFailed { task: name, message }))
                }
            };

            match outcome {
                Ok(()) => tracing::debug!(task = name, "Task finished"),
                Err(e) => {
                    if first.is_none() {
                        tracing::error!(task = name, error = %e, "Task failed, stopping the group");
                        self.token.cancel();
                        first = Some(e);
                    } else {
                        tracing::debug!(
                            task = name,
                            error = %e,
                            "Task failed after shutdown began"
                        );
                    }
                }
            }
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn name(&self, id: Id) -> &'static str {
        self.names.get(&id).copied().unwrap_or("unknown")
    }
}

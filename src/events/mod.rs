//! Workload lifecycle events.
//!
//! # Data Flow
//! ```text
//! Orchestrator (docker.rs)
//!     → EventStream (WorkloadEvent, in delivery order)
//!     → watch_events (one event at a time)
//!     → RoutingTable::apply
//! ```
//!
//! # Design Decisions
//! - Bad labels are the table's concern and never end the loop
//! - A failing or ending stream ends the loop with an error; stale routing
//!   is worse than a restart

pub mod docker;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use axum::http::StatusCode;
use futures_util::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;
use crate::routing::RoutingTable;

pub use docker::DockerEvents;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadAction {
    Start,
    Stop,
    Other(String),
}

impl WorkloadAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "start" => Self::Start,
            "stop" => Self::Stop,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for WorkloadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Stop => f.write_str("stop"),
            Self::Other(action) => f.write_str(action),
        }
    }
}

/// One lifecycle change of a workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadEvent {
    pub id: String,
    pub action: WorkloadAction,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error("failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP handshake with the event source failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("failed to build request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("{path} returned {status}")]
    Status { path: String, status: StatusCode },

    #[error("event stream broke: {0}")]
    Body(#[source] axum::Error),

    #[error("undecodable event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("event line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

/// Live events, in the order the source delivered them.
pub type EventStream = BoxStream<'static, Result<WorkloadEvent, EventSourceError>>;

/// Feed events into the table until cancelled or the stream fails.
pub async fn watch_events(
    table: &RoutingTable,
    mut events: EventStream,
    shutdown: CancellationToken,
) -> Result<(), ProxyError> {
    tracing::info!("Watching workload events");
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Event watcher stopping");
                return Ok(());
            }
            next = events.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                tracing::debug!(workload = %event.id, action = %event.action, "Workload event");
                table.apply(&event);
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Event source failed");
                return Err(ProxyError::Events(e));
            }
            None => {
                tracing::error!("Event stream ended");
                return Err(ProxyError::EventStreamEnded);
            }
        }
    }
}

//! Docker Engine event source.
//!
//! # Responsibilities
//! - Talk HTTP/1.1 to the Engine API over its Unix socket
//! - Subscribe to container start/stop events
//! - Replay running containers as synthetic starts
//! - Decode the newline-delimited JSON event feed
//!
//! # Design Decisions
//! - One connection per API call; the events connection lives as long as
//!   the returned stream
//! - The subscription opens before the container listing so no start
//!   between the two is missed; a duplicate start is harmless

use std::collections::HashMap;
use std::path::PathBuf;

use axum::body::{Body, BodyDataStream};
use axum::http::{header, Request, Response};
use futures_util::stream::{self, StreamExt};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::net::UnixStream;

use crate::config::DockerConfig;
use crate::events::{EventSourceError, EventStream, WorkloadAction, WorkloadEvent};

const LIST_LIMIT: usize = 16 * 1024 * 1024;
const LINE_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
struct EngineEvent {
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Action", default)]
    action: String,
    #[serde(rename = "Actor", default)]
    actor: Actor,
}

#[derive(Debug, Default, Deserialize)]
struct Actor {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Attributes", default)]
    attributes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
}

impl From<EngineEvent> for WorkloadEvent {
    fn from(event: EngineEvent) -> Self {
        Self {
            id: event.actor.id,
            action: WorkloadAction::parse(&event.action),
            labels: event.actor.attributes,
        }
    }
}

impl From<ContainerSummary> for WorkloadEvent {
    fn from(container: ContainerSummary) -> Self {
        Self {
            id: container.id,
            action: WorkloadAction::Start,
            labels: container.labels.unwrap_or_default(),
        }
    }
}

/// Client for the Docker Engine API on a Unix socket.
#[derive(Debug, Clone)]
pub struct DockerEvents {
    socket_path: PathBuf,
}

impl DockerEvents {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn from_config(config: &DockerConfig) -> Self {
        Self::new(&config.socket_path)
    }

    /// Subscribe to container events, preceded by one start per running
    /// container.
    pub async fn subscribe(&self) -> Result<EventStream, EventSourceError> {
        let live = self.get(&events_path()).await?;
        let running = self.running_containers().await?;
        tracing::info!(
            socket = %self.socket_path.display(),
            running = running.len(),
            "Subscribed to Docker events"
        );

        let replay = stream::iter(running.into_iter().map(|c| Ok(WorkloadEvent::from(c))));
        Ok(replay.chain(decode_events(Body::new(live.into_body()))).boxed())
    }

    async fn running_containers(&self) -> Result<Vec<ContainerSummary>, EventSourceError> {
        let response = self.get("/containers/json").await?;
        let body = axum::body::to_bytes(Body::new(response.into_body()), LIST_LIMIT)
            .await
            .map_err(EventSourceError::Body)?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get(&self, path: &str) -> Result<Response<Incoming>, EventSourceError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| EventSourceError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(EventSourceError::Handshake)?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "Docker API connection closed");
            }
        });

        let request = Request::builder()
            .uri(path)
            .header(header::HOST, "docker")
            .body(Body::empty())?;
        let response = sender
            .send_request(request)
            .await
            .map_err(EventSourceError::Handshake)?;

        if !response.status().is_success() {
            return Err(EventSourceError::Status {
                path: path.to_string(),
                status: response.status(),
            });
        }
        Ok(response)
    }
}

fn events_path() -> String {
    let filters = serde_json::json!({
        "type": ["container"],
        "event": ["start", "stop"],
    });
    let encoded: String =
        url::form_urlencoded::byte_serialize(filters.to_string().as_bytes()).collect();
    format!("/events?filters={}", encoded)
}

struct LineReader {
    body: BodyDataStream,
    buffer: Vec<u8>,
    limit: usize,
}

impl LineReader {
    fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.buffer.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        Some(line)
    }
}

/// Turn a newline-delimited JSON body into container events.
///
/// Events for other object types are skipped. The stream ends after the
/// first error, including a line longer than `LINE_LIMIT`.
fn decode_events(body: Body) -> EventStream {
    decode_lines(body, LINE_LIMIT)
}

fn decode_lines(body: Body, limit: usize) -> EventStream {
    let reader = LineReader {
        body: body.into_data_stream(),
        buffer: Vec::new(),
        limit,
    };

    stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        loop {
            while let Some(line) = reader.next_line() {
                let line = line.trim_ascii();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_slice::<EngineEvent>(line) {
                    Ok(event) if event.kind.is_empty() || event.kind == "container" => {
                        return Some((Ok(WorkloadEvent::from(event)), Some(reader)));
                    }
                    Ok(event) => {
                        tracing::trace!(kind = %event.kind, "Skipping non-container event");
                    }
                    Err(e) => return Some((Err(EventSourceError::Decode(e)), None)),
                }
            }

            if reader.buffer.len() > reader.limit {
                return Some((Err(EventSourceError::LineTooLong { limit: reader.limit }), None));
            }

            match reader.body.next().await {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Some((Err(EventSourceError::Body(e)), None)),
                None => return None,
            }
        }
    })
    .boxed()
}

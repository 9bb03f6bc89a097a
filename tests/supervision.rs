//! Fail-fast behaviour of the whole server.

use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use rproxy::events::{EventSourceError, WorkloadAction, WorkloadEvent};
use rproxy::{ProxyError, Server};
use tokio_util::sync::CancellationToken;

mod common;

#[tokio::test]
async fn test_event_source_failure_stops_everything() {
    let server = Server::new(common::loopback_config(), common::certificates().await);

    let events = stream::once(async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Err(EventSourceError::Status {
            path: "/events".into(),
            status: axum::http::StatusCode::SERVICE_UNAVAILABLE,
        })
    })
    .boxed();

    let parent = CancellationToken::new();
    let result = tokio::time::timeout(Duration::from_secs(5), server.run(events, &parent))
        .await
        .expect("servers did not shut down after the event source failed");

    assert!(matches!(
        result,
        Err(ProxyError::Events(EventSourceError::Status { .. }))
    ));
    assert!(!parent.is_cancelled());
}

#[tokio::test]
async fn test_listener_failure_stops_everything() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = common::loopback_config();
    config.listener.http_address = taken.local_addr().unwrap().to_string();

    let server = Server::new(config, common::certificates().await);
    let parent = CancellationToken::new();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        server.run(stream::pending().boxed(), &parent),
    )
    .await
    .expect("servers did not shut down after the listener failed");

    assert!(matches!(result, Err(ProxyError::Listener(_))));
}

#[tokio::test]
async fn test_parent_cancellation_is_clean() {
    let server = Server::new(common::loopback_config(), common::certificates().await);
    let routes = server.routes();

    let events = stream::iter(vec![Ok(WorkloadEvent {
        id: "web".into(),
        action: WorkloadAction::Start,
        labels: [
            ("rproxy.frontend".to_string(), "https://web.example.com".to_string()),
            ("rproxy.backend".to_string(), "http://web:8080".to_string()),
        ]
        .into_iter()
        .collect(),
    })])
    .chain(stream::pending())
    .boxed();

    let parent = CancellationToken::new();
    let cancel = parent.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), server.run(events, &parent))
        .await
        .expect("servers did not stop after cancellation");
    assert!(result.is_ok());
    assert_eq!(routes.len(), 1);
}

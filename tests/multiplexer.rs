//! End-to-end tests of the shared plaintext port.

use std::time::Duration;

use rproxy::http::serve_plaintext;
use rproxy::net::Listener;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

mod common;

#[tokio::test]
async fn test_ssh_passthrough_is_complete() {
    let reply = vec![b'r'; 50];
    let (upstream, received) = common::start_ssh_upstream(reply.clone()).await;

    let mut config = common::loopback_config();
    config.passthrough.upstream = upstream.to_string();
    let listener = Listener::bind("127.0.0.1:0", 16).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let token = CancellationToken::new();
    let certs = common::certificates().await;
    let server = tokio::spawn({
        let token = token.clone();
        async move { serve_plaintext(listener, &config, certs, token).await }
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut payload = b"SSH-2.0-x".to_vec();
    payload.extend(std::iter::repeat(b'p').take(100));
    client.write_all(&payload).await.unwrap();
    client.shutdown().await.unwrap();

    let mut from_upstream = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut from_upstream))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(from_upstream, reply);

    let to_upstream = tokio::time::timeout(Duration::from_secs(5), received)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(to_upstream.len(), 109);
    assert_eq!(to_upstream, payload);

    token.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_http_is_redirected_and_short_prefix_dropped() {
    let mut config = common::loopback_config();
    config.listener.https_address = "127.0.0.1:8443".into();
    let listener = Listener::bind("127.0.0.1:0", 16).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let token = CancellationToken::new();
    let certs = common::certificates().await;
    let server = tokio::spawn({
        let token = token.clone();
        async move { serve_plaintext(listener, &config, certs, token).await }
    });

    // Two bytes then EOF: classification fails and the socket is closed.
    let mut short = TcpStream::connect(addr).await.unwrap();
    short.write_all(b"SS").await.unwrap();
    short.shutdown().await.unwrap();
    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), short.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_empty());

    // The loop keeps serving.
    let response = common::http_client()
        .get(format!("http://{}/docs?page=2", addr))
        .header("host", "app.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::FOUND);
    assert_eq!(
        response.headers()["location"],
        "https://app.example.com:8443/docs?page=2"
    );

    token.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rproxy::config::ProxyConfig;
use rproxy::tls::StaticCertificates;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Start a simple mock backend that returns a fixed response.
#[allow(dead_code)]
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut request = [0u8; 4096];
                        let _ = socket.read(&mut request).await;
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Start a fake SSH server for one connection.
///
/// It writes `reply` and half-closes, then reads until the client is done
/// and reports everything it received.
#[allow(dead_code)]
pub async fn start_ssh_upstream(reply: Vec<u8>) -> (SocketAddr, oneshot::Receiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(&reply).await.unwrap();
        socket.shutdown().await.unwrap();

        let mut received = Vec::new();
        socket.read_to_end(&mut received).await.unwrap();
        let _ = tx.send(received);
    });
    (addr, rx)
}

/// A self-signed certificate manager for `localhost`.
#[allow(dead_code)]
pub async fn certificates() -> Arc<StaticCertificates> {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let pem_key = key_pair.serialize_pem().into_bytes();
    let certs = StaticCertificates::from_pem(cert.pem().into_bytes(), pem_key)
        .await
        .unwrap();
    Arc::new(certs)
}

/// Defaults with every listener on an ephemeral loopback port.
#[allow(dead_code)]
pub fn loopback_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.http_address = "127.0.0.1:0".into();
    config.listener.https_address = "127.0.0.1:0".into();
    config.classifier.peek_timeout_secs = 2;
    config.timeouts.shutdown_grace_secs = 1;
    config
}

/// HTTP client that neither follows redirects nor uses a system proxy.
#[allow(dead_code)]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

//! HTTP server setup and the two serving loops.
//!
//! # Responsibilities
//! - Build the plaintext router (challenges + HTTPS redirect)
//! - Build the proxy router (challenges + proxy handler) with middleware
//! - Run the multiplexed plaintext socket and its HTTP server together
//! - Run the TLS server
//! - Stop both gracefully, within a grace period, when cancelled
//!
//! # Design Decisions
//! - The plaintext socket is owned by the multiplexer; axum only ever sees
//!   connections classified as HTTP, through the handoff listener
//! - A multiplexer failure stops its HTTP server too, so the loop returns
//!   instead of idling without a socket

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::Request, middleware, Router};
use axum_server::Handle;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::proxy::{proxy_handler, ProxyState};
use crate::http::redirect::redirect_to_https;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::shutdown;
use crate::net::{handoff, Classifier, Listener, Multiplexer, Passthrough};
use crate::routing::RoutingTable;
use crate::tls::{acme_challenge, CertificateManager};

const DEFAULT_HTTPS_PORT: u16 = 443;

/// Router for the plaintext listener.
pub fn redirect_router(https_port: u16, certificates: Arc<dyn CertificateManager>) -> Router {
    Router::new()
        .fallback(move |request: Request| redirect_to_https(https_port, request))
        .layer(middleware::from_fn_with_state(certificates, acme_challenge))
        .layer(TraceLayer::new_for_http())
}

/// Router for the TLS listener.
#[allow(deprecated)]
pub fn proxy_router(
    state: ProxyState,
    certificates: Arc<dyn CertificateManager>,
    config: &ProxyConfig,
) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .with_state(state)
        .layer(middleware::from_fn_with_state(certificates, acme_challenge))
        .layer(TimeoutLayer::new(config.timeouts.request()))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}

/// Port to put in redirects, taken from the HTTPS listen address.
pub fn https_port(config: &ProxyConfig) -> u16 {
    config
        .listener
        .https_address
        .parse::<SocketAddr>()
        .map(|addr| addr.port())
        .unwrap_or(DEFAULT_HTTPS_PORT)
}

/// Bind the plaintext socket and serve it until cancelled.
pub async fn run_http(
    config: &ProxyConfig,
    certificates: Arc<dyn CertificateManager>,
    shutdown: CancellationToken,
) -> Result<(), ProxyError> {
    let listener =
        Listener::bind(&config.listener.http_address, config.listener.max_connections).await?;
    serve_plaintext(listener, config, certificates, shutdown).await
}

/// Serve an already bound plaintext socket.
///
/// SSH connections are passed through to the configured upstream; the rest
/// go to the redirect router.
pub async fn serve_plaintext(
    listener: Listener,
    config: &ProxyConfig,
    certificates: Arc<dyn CertificateManager>,
    shutdown: CancellationToken,
) -> Result<(), ProxyError> {
    let addr = listener.local_addr()?;
    let stop = shutdown.child_token();
    let (handoff, http_listener) =
        handoff::channel(addr, config.listener.handoff_backlog, stop.child_token());
    let mux = Multiplexer::new(
        listener,
        Classifier::from_config(&config.classifier),
        Passthrough::from_config(&config.passthrough),
        handoff,
    );
    let app = redirect_router(https_port(config), certificates);

    tracing::info!(
        address = %addr,
        upstream = %config.passthrough.upstream,
        "Plaintext listener ready"
    );

    let accept = async {
        let result = mux.run(stop.clone()).await;
        if result.is_err() {
            stop.cancel();
        }
        result
    };
    let serve = axum::serve(http_listener, app)
        .with_graceful_shutdown(stop.clone().cancelled_owned())
        .into_future();
    let serve = shutdown::bounded("http", serve, stop.clone(), config.timeouts.shutdown_grace());

    let (accepted, served) = tokio::join!(accept, serve);
    accepted?;
    if let Some(served) = served {
        served?;
    }
    tracing::info!(address = %addr, "Plaintext listener stopped");
    Ok(())
}

/// Serve the proxy over TLS until cancelled.
pub async fn run_https(
    config: &ProxyConfig,
    routes: Arc<RoutingTable>,
    certificates: Arc<dyn CertificateManager>,
    shutdown: CancellationToken,
) -> Result<(), ProxyError> {
    let addr: SocketAddr = config
        .listener
        .https_address
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let handle = Handle::new();
    serve_tls(addr, handle, config, routes, certificates, shutdown).await
}

/// Serve the proxy over TLS on `addr`; `handle` reports the bound address.
pub async fn serve_tls(
    addr: SocketAddr,
    handle: Handle,
    config: &ProxyConfig,
    routes: Arc<RoutingTable>,
    certificates: Arc<dyn CertificateManager>,
    shutdown: CancellationToken,
) -> Result<(), ProxyError> {
    let tls = certificates.tls_config();
    let state = ProxyState::new(routes, &config.timeouts);
    let app = proxy_router(state, certificates, config);

    let grace = config.timeouts.shutdown_grace();
    let waiter = handle.clone();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        tracing::info!("TLS listener draining");
        waiter.graceful_shutdown(Some(grace));
    });

    tracing::info!(address = %addr, "TLS listener starting");
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    tracing::info!(address = %addr, "TLS listener stopped");
    Ok(())
}

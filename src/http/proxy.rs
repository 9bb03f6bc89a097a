//! Reverse proxy handler.
//!
//! # Responsibilities
//! - Look up (host, path) in the current router snapshot
//! - Rewrite the request onto the matched backend
//! - Forward with the pooled HTTP client and stream the response back
//!
//! # Design Decisions
//! - One snapshot per request; a concurrent table update never changes the
//!   route of a request already in flight
//! - The client's Host header is forwarded unchanged
//! - No retries: a failed upstream request is a 502

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode, Version},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::TimeoutConfig;
use crate::http::headers::{request_host, set_forwarded, strip_hop_by_hop};
use crate::http::request::request_id;
use crate::observability::metrics;
use crate::routing::RoutingTable;

/// State shared by every proxied request.
#[derive(Clone)]
pub struct ProxyState {
    pub routes: Arc<RoutingTable>,
    pub client: Client<HttpConnector, Body>,
}

impl ProxyState {
    pub fn new(routes: Arc<RoutingTable>, timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect()));
        connector.set_nodelay(true);

        Self {
            routes,
            client: Client::builder(TokioExecutor::new()).build(connector),
        }
    }
}

/// Forward a request to the backend its frontend maps to.
pub async fn proxy_handler(State(state): State<ProxyState>, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let request_id = request_id(&request).to_string();
    let path = request.uri().path().to_string();
    let host = request_host(&request).unwrap_or_default().to_string();

    let router = state.routes.router();
    let Some(route) = router.lookup(&host, &path) else {
        tracing::debug!(request_id = %request_id, host = %host, path = %path, "No route matched");
        metrics::record_request(method.as_str(), 404, start);
        return (StatusCode::NOT_FOUND, "404 page not found\n").into_response();
    };

    let target = match route.rewrite(request.uri()) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                workload = %route.workload,
                error = %e,
                "Could not rewrite request"
            );
            metrics::record_request(method.as_str(), 502, start);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let (mut parts, body) = request.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    set_forwarded(&mut parts.headers, client_ip, Some(&host), "https");
    if !parts.headers.contains_key(header::HOST) {
        if let Ok(value) = HeaderValue::from_str(&host) {
            parts.headers.insert(header::HOST, value);
        }
    }
    parts.uri = target;
    parts.version = Version::HTTP_11;

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        workload = %route.workload,
        upstream = %parts.uri,
        "Proxying request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            metrics::record_request(method.as_str(), parts.status.as_u16(), start);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                workload = %route.workload,
                backend = %route.backend,
                error = %e,
                "Upstream request failed"
            );
            metrics::record_request(method.as_str(), 502, start);
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

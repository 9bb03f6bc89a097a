//! HTTP-01 challenge responder.
//!
//! Installed in front of both the redirect router and the proxy router so a
//! certificate authority can validate a host over either port.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::headers::request_host;
use crate::routing::matcher::normalize_host;
use crate::tls::CertificateManager;

pub const CHALLENGE_PATH: &str = "/.well-known/acme-challenge/";

/// Answer a pending challenge, or hand the request to the next layer.
pub async fn acme_challenge(
    State(certs): State<Arc<dyn CertificateManager>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(token) = request.uri().path().strip_prefix(CHALLENGE_PATH) {
        let host = request_host(&request).map(normalize_host).unwrap_or_default();
        if let Some(key_authorization) = certs.challenge_response(&host, token) {
            tracing::info!(host = %host, token = %token, "Answered HTTP-01 challenge");
            let content_type = [(header::CONTENT_TYPE, "application/octet-stream")];
            return (content_type, key_authorization).into_response();
        }
    }
    next.run(request).await
}

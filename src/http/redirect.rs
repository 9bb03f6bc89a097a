//! HTTP to HTTPS redirect for the plaintext listener.

use axum::{
    extract::Request,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::headers::request_host;
use crate::routing::matcher::normalize_host;

/// Build the `https://` location for a plaintext request.
///
/// The port is dropped from the host and `https_port` is appended when it
/// is not 443.
pub fn https_location(host: &str, https_port: u16, path_and_query: &str) -> String {
    let host = normalize_host(host);
    let path = if path_and_query.starts_with('/') {
        path_and_query.to_string()
    } else {
        format!("/{}", path_and_query)
    };
    match https_port {
        443 => format!("https://{}{}", host, path),
        port => format!("https://{}:{}{}", host, port, path),
    }
}

/// Handler answering every request with `302 Found` to the HTTPS origin.
pub async fn redirect_to_https(https_port: u16, request: Request) -> Response {
    let Some(host) = request_host(&request) else {
        return (StatusCode::BAD_REQUEST, "missing Host header").into_response();
    };
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let location = https_location(host, https_port, path_and_query);
    tracing::debug!(location = %location, "Redirecting to HTTPS");
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn location_drops_port() {
        assert_eq!(
            https_location("example.com:80", 443, "/a/b?x=1"),
            "https://example.com/a/b?x=1"
        );
        assert_eq!(https_location("Example.com", 443, "/"), "https://example.com/");
        assert_eq!(https_location("example.com:8080", 8443, "/a"), "https://example.com:8443/a");
        assert_eq!(https_location("[::1]:80", 443, "/"), "https://[::1]/");
    }

    #[tokio::test]
    async fn redirects_with_found() {
        let request = axum::http::Request::builder()
            .uri("/docs?page=2")
            .header("host", "example.com")
            .body(Body::empty())
            .unwrap();
        let response = redirect_to_https(443, request).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "https://example.com/docs?page=2");
    }

    #[tokio::test]
    async fn missing_host_is_bad_request() {
        let request = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = redirect_to_https(443, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

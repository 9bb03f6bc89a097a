//! Header handling for forwarded requests.
//!
//! # Responsibilities
//! - Resolve the host a request was addressed to
//! - Remove hop-by-hop headers in both directions
//! - Record the client in `X-Forwarded-*` headers

use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Host the client addressed, from the Host header or an absolute URI.
pub fn request_host<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
}

/// Remove connection-scoped headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Append the client to `X-Forwarded-For` and set host and proto.
pub fn set_forwarded(
    headers: &mut HeaderMap,
    client: Option<IpAddr>,
    host: Option<&str>,
    proto: &'static str,
) {
    if let Some(ip) = client {
        let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) if !prior.is_empty() => format!("{}, {}", prior, ip),
            _ => ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if let Some(value) = host.and_then(|h| HeaderValue::from_str(h).ok()) {
        headers.insert(X_FORWARDED_HOST, value);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(proto));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn host_from_header_or_uri() {
        let req = Request::builder()
            .uri("/x")
            .header("host", "a.example.com:8443")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&req), Some("a.example.com:8443"));

        let req = Request::builder()
            .uri("http://b.example.com/x")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&req), Some("b.example.com"));

        let req = Request::builder().uri("/x").body(Body::empty()).unwrap();
        assert_eq!(request_host(&req), None);
    }

    #[test]
    fn strips_listed_and_standard_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive, X-Secret"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-secret", HeaderValue::from_static("1"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("accept"));
    }

    #[test]
    fn forwarded_for_appends() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));

        let client = Some("192.0.2.7".parse().unwrap());
        set_forwarded(&mut headers, client, Some("a.example.com"), "https");

        assert_eq!(headers[&X_FORWARDED_FOR], "10.0.0.1, 192.0.2.7");
        assert_eq!(headers[&X_FORWARDED_HOST], "a.example.com");
        assert_eq!(headers[&X_FORWARDED_PROTO], "https");
    }
}

//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (connections, passthrough bytes, routes, requests)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `rproxy_connections_total` (counter): classified connections by protocol
//! - `rproxy_classify_failures_total` (counter): connections closed before classification
//! - `rproxy_passthrough_bytes_total` (counter): bytes relayed by direction
//! - `rproxy_routes` (gauge): entries in the routing table
//! - `rproxy_requests_total` (counter): proxied requests by method, status
//! - `rproxy_request_duration_seconds` (histogram): proxied request latency
//!
//! # Design Decisions
//! - Recording is a no-op until the exporter is installed, so library users
//!   and tests pay nothing

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::net::classify::Protocol;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_connection(protocol: Protocol) {
    ::metrics::counter!("rproxy_connections_total", "protocol" => protocol.as_str()).increment(1);
}

pub fn record_classify_failure() {
    ::metrics::counter!("rproxy_classify_failures_total").increment(1);
}

pub fn record_passthrough_bytes(to_upstream: u64, to_client: u64) {
    ::metrics::counter!("rproxy_passthrough_bytes_total", "direction" => "to_upstream")
        .increment(to_upstream);
    ::metrics::counter!("rproxy_passthrough_bytes_total", "direction" => "to_client")
        .increment(to_client);
}

pub fn record_routes(count: usize) {
    ::metrics::gauge!("rproxy_routes").set(count as f64);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "rproxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("rproxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

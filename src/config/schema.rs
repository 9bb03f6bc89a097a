//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listening sockets and connection limits.
    pub listener: ListenerConfig,

    /// Protocol sniffing on the multiplexed socket.
    pub classifier: ClassifierConfig,

    /// Raw TCP passthrough for non-HTTP connections.
    pub passthrough: PassthroughConfig,

    /// Workload label contract.
    pub routing: RoutingConfig,

    /// Docker Engine event source.
    pub docker: DockerConfig,

    /// Certificate files for the TLS listener.
    pub tls: TlsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Plaintext address; connections here are classified before dispatch.
    pub http_address: String,

    /// TLS address serving the proxy handler.
    pub https_address: String,

    /// Maximum concurrent connections on the multiplexed socket (backpressure).
    pub max_connections: usize,

    /// Classified connections queued for the HTTP server before the
    /// classifier waits.
    pub handoff_backlog: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            http_address: "0.0.0.0:80".to_string(),
            https_address: "0.0.0.0:443".to_string(),
            max_connections: 10_000,
            handoff_backlog: 128,
        }
    }
}

/// Protocol classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Number of leading bytes read before a decision is made.
    pub peek_bytes: usize,

    /// Upper bound on the initial read, in seconds.
    pub peek_timeout_secs: u64,
}

impl ClassifierConfig {
    pub fn peek_timeout(&self) -> Duration {
        Duration::from_secs(self.peek_timeout_secs)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            peek_bytes: 10,
            peek_timeout_secs: 10,
        }
    }
}

/// Passthrough proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PassthroughConfig {
    /// Upstream `host:port` dialed for every SSH connection.
    pub upstream: String,

    /// Dial timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl PassthroughConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            upstream: "127.0.0.1:2222".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// Labels a workload carries to opt into proxying.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Label holding the frontend URL (scheme, host, optional path).
    pub frontend_label: String,

    /// Label holding the backend URL (scheme, host, port).
    pub backend_label: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            frontend_label: "rproxy.frontend".to_string(),
            backend_label: "rproxy.backend".to_string(),
        }
    }
}

/// Docker Engine connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Path to the Docker Engine Unix socket.
    pub socket_path: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket_path: "/var/run/docker.sock".to_string(),
        }
    }
}

/// TLS configuration for the HTTPS listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: "cert.pem".to_string(),
            key_path: "key.pem".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed until the backend's response headers, in seconds.
    pub request_secs: u64,

    /// How long servers drain in-flight requests after cancellation.
    pub shutdown_grace_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

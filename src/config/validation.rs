//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that the classifier reads enough bytes to match every signature
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::net::classify::{Protocol, MAX_PEEK_BYTES};

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration, collecting every violation.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.http_address", &config.listener.http_address);
    check_socket_addr(&mut errors, "listener.https_address", &config.listener.https_address);

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if config.listener.handoff_backlog == 0 {
        errors.push(ValidationError::new("listener.handoff_backlog", "must be greater than 0"));
    }

    let min_peek = Protocol::longest_signature();
    if config.classifier.peek_bytes < min_peek || config.classifier.peek_bytes > MAX_PEEK_BYTES {
        errors.push(ValidationError::new(
            "classifier.peek_bytes",
            format!("must be between {} and {}", min_peek, MAX_PEEK_BYTES),
        ));
    }
    if config.classifier.peek_timeout_secs == 0 {
        errors.push(ValidationError::new("classifier.peek_timeout_secs", "must be greater than 0"));
    }

    match config.passthrough.upstream.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
        _ => errors.push(ValidationError::new(
            "passthrough.upstream",
            format!("expected host:port, got {:?}", config.passthrough.upstream),
        )),
    }
    if config.passthrough.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "passthrough.connect_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.routing.frontend_label.is_empty() {
        errors.push(ValidationError::new("routing.frontend_label", "must not be empty"));
    }
    if config.routing.backend_label.is_empty() {
        errors.push(ValidationError::new("routing.backend_label", "must not be empty"));
    }
    if config.routing.frontend_label == config.routing.backend_label {
        errors.push(ValidationError::new(
            "routing.backend_label",
            "must differ from routing.frontend_label",
        ));
    }

    if config.docker.socket_path.is_empty() {
        errors.push(ValidationError::new("docker.socket_path", "must not be empty"));
    }
    if config.tls.cert_path.is_empty() {
        errors.push(ValidationError::new("tls.cert_path", "must not be empty"));
    }
    if config.tls.key_path.is_empty() {
        errors.push(ValidationError::new("tls.key_path", "must not be empty"));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.shutdown_grace_secs == 0 {
        errors.push(ValidationError::new("timeouts.shutdown_grace_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("invalid socket address {:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_violation() {
        let mut config = ProxyConfig::default();
        config.listener.http_address = "not-an-address".into();
        config.classifier.peek_bytes = 3;
        config.passthrough.upstream = "localhost".into();
        config.routing.backend_label = config.routing.frontend_label.clone();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();

        assert_eq!(
            fields,
            vec![
                "listener.http_address",
                "classifier.peek_bytes",
                "passthrough.upstream",
                "routing.backend_label",
            ]
        );
    }

    #[test]
    fn metrics_address_only_checked_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}

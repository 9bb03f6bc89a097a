//! Certificate subsystem.
//!
//! # Data Flow
//! ```text
//! RoutingTable change
//!     → CertificateManager::ensure_certificate(host)   (fire-and-forget)
//!
//! HTTPS listener
//!     → CertificateManager::tls_config()               (rustls server config)
//!
//! Plaintext + HTTPS routers
//!     → challenge.rs (answers /.well-known/acme-challenge/<token>)
//!     → CertificateManager::challenge_response(host, token)
//! ```
//!
//! # Design Decisions
//! - Issuance lives behind a trait so an ACME client can be plugged in
//! - `static_certs.rs` serves one PEM certificate for every host

pub mod challenge;
pub mod static_certs;

use std::path::PathBuf;

use axum_server::tls_rustls::RustlsConfig;
use futures_util::future::BoxFuture;
use thiserror::Error;

pub use challenge::{acme_challenge, CHALLENGE_PATH};
pub use static_certs::StaticCertificates;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("{kind} file not found: {}", path.display())]
    NotFound { kind: &'static str, path: PathBuf },

    #[error("failed to load TLS material: {0}")]
    Load(#[from] std::io::Error),

    #[error("failed to obtain a certificate for {host}: {message}")]
    Issue { host: String, message: String },
}

/// Source of TLS configuration and per-host certificates.
pub trait CertificateManager: Send + Sync + 'static {
    /// Server configuration handed to the HTTPS listener.
    fn tls_config(&self) -> RustlsConfig;

    /// Make sure a certificate for `hostname` exists or is being obtained.
    fn ensure_certificate(&self, hostname: String)
        -> BoxFuture<'static, Result<(), CertificateError>>;

    /// Key authorization for a pending HTTP-01 challenge, if any.
    fn challenge_response(&self, host: &str, token: &str) -> Option<String>;
}

/// Throwaway self-signed certificates for unit tests.
#[cfg(test)]
pub(crate) async fn self_signed() -> StaticCertificates {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    StaticCertificates::from_pem(cert.pem().into_bytes(), key_pair.serialize_pem().into_bytes())
        .await
        .unwrap()
}

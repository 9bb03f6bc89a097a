//! Certificate manager backed by a fixed PEM certificate.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use axum_server::tls_rustls::RustlsConfig;
use futures_util::future::{self, BoxFuture, FutureExt};

use crate::config::TlsConfig;
use crate::tls::{CertificateError, CertificateManager};

/// Serves one certificate for every host and remembers which hosts asked.
pub struct StaticCertificates {
    config: RustlsConfig,
    hosts: Mutex<HashSet<String>>,
}

impl StaticCertificates {
    /// Load the certificate and key named in the config.
    pub async fn load(config: &TlsConfig) -> Result<Self, CertificateError> {
        let cert_path = Path::new(&config.cert_path);
        let key_path = Path::new(&config.key_path);

        if !cert_path.exists() {
            return Err(CertificateError::NotFound {
                kind: "certificate",
                path: cert_path.to_path_buf(),
            });
        }
        if !key_path.exists() {
            return Err(CertificateError::NotFound {
                kind: "private key",
                path: key_path.to_path_buf(),
            });
        }

        let config = RustlsConfig::from_pem_file(cert_path, key_path).await?;
        Ok(Self::with_config(config))
    }

    /// Build from in-memory PEM data.
    pub async fn from_pem(cert: Vec<u8>, key: Vec<u8>) -> Result<Self, CertificateError> {
        let config = RustlsConfig::from_pem(cert, key).await?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: RustlsConfig) -> Self {
        Self {
            config,
            hosts: Mutex::new(HashSet::new()),
        }
    }

    /// Hosts seen so far, sorted.
    #[cfg(test)]
    pub(crate) fn hosts(&self) -> Vec<String> {
        let hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        let mut hosts: Vec<String> = hosts.iter().cloned().collect();
        hosts.sort();
        hosts
    }
}

impl CertificateManager for StaticCertificates {
    fn tls_config(&self) -> RustlsConfig {
        self.config.clone()
    }

    fn ensure_certificate(
        &self,
        hostname: String,
    ) -> BoxFuture<'static, Result<(), CertificateError>> {
        let inserted = self
            .hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hostname.clone());
        if inserted {
            tracing::info!(host = %hostname, "Serving host with the static certificate");
        }
        future::ready(Ok(())).boxed()
    }

    fn challenge_response(&self, _host: &str, _token: &str) -> Option<String> {
        None
    }
}

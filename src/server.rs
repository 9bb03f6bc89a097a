//! Top-level proxy server.
//!
//! Wires the routing table, the certificate manager and the three
//! long-running loops (event watcher, plaintext listener, TLS listener) into
//! one supervised group.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::events::{watch_events, EventStream};
use crate::http;
use crate::lifecycle::Supervisor;
use crate::routing::RoutingTable;
use crate::tls::CertificateManager;

pub struct Server {
    config: Arc<ProxyConfig>,
    certificates: Arc<dyn CertificateManager>,
    routes: Arc<RoutingTable>,
}

impl Server {
    pub fn new(config: ProxyConfig, certificates: Arc<dyn CertificateManager>) -> Self {
        let routes = Arc::new(RoutingTable::new(config.routing.clone(), certificates.clone()));
        Self {
            config: Arc::new(config),
            certificates,
            routes,
        }
    }

    /// The routing table fed by the event watcher.
    pub fn routes(&self) -> Arc<RoutingTable> {
        self.routes.clone()
    }

    /// Run until `shutdown` is cancelled or one loop fails.
    ///
    /// Returns `Ok(())` only for a shutdown requested through `shutdown`;
    /// otherwise the first loop error, after the other loops have stopped.
    pub async fn run(
        self,
        events: EventStream,
        shutdown: &CancellationToken,
    ) -> Result<(), ProxyError> {
        tracing::info!(
            http = %self.config.listener.http_address,
            https = %self.config.listener.https_address,
            "Proxy starting"
        );

        let mut group = Supervisor::new(shutdown);

        let routes = self.routes.clone();
        group.spawn("events", move |token| async move {
            watch_events(&routes, events, token).await
        });

        let config = self.config.clone();
        let certificates = self.certificates.clone();
        group.spawn("http", move |token| async move {
            http::run_http(&config, certificates, token).await
        });

        let config = self.config.clone();
        let routes = self.routes.clone();
        let certificates = self.certificates.clone();
        group.spawn("https", move |token| async move {
            http::run_https(&config, routes, certificates, token).await
        });

        let result = group.wait().await;
        match &result {
            Ok(()) => tracing::info!("Proxy stopped"),
            Err(e) => tracing::error!(error = %e, "Proxy stopped with an error"),
        }
        result
    }
}

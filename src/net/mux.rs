//! Accept loop and dispatch policy for the multiplexed socket.
//!
//! # Data Flow
//! ```text
//! accept (bounded) → classify (peek N bytes)
//!     ├─ SSH  → passthrough to the configured upstream (terminal)
//!     └─ else → handoff queue → ProxyListener → HTTP server
//! ```
//!
//! Dispatch is one-shot; a connection is never reclassified.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::net::classify::{Classifier, Protocol};
use crate::net::connection::ClassifiedConnection;
use crate::net::handoff::Handoff;
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::passthrough::Passthrough;
use crate::observability::metrics;

/// Owns the real listening socket and routes each connection by protocol.
pub struct Multiplexer {
    listener: Listener,
    shared: Arc<Dispatch>,
}

struct Dispatch {
    classifier: Classifier,
    passthrough: Passthrough,
    handoff: Handoff,
}

impl Multiplexer {
    pub fn new(
        listener: Listener,
        classifier: Classifier,
        passthrough: Passthrough,
        handoff: Handoff,
    ) -> Self {
        Self {
            listener,
            shared: Arc::new(Dispatch {
                classifier,
                passthrough,
                handoff,
            }),
        }
    }

    /// Accept until `shutdown` is cancelled or the socket fails.
    ///
    /// Per-connection failures are logged and never end the loop. Sessions
    /// already dispatched keep running after this returns.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ListenerError> {
        loop {
            let (stream, peer_addr, permit) = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Multiplexer stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted?,
            };

            let shared = Arc::clone(&self.shared);
            tokio::spawn(
                async move {
                    shared.dispatch(stream, peer_addr, permit).await;
                }
                .instrument(tracing::info_span!("connection", peer = %peer_addr)),
            );
        }
    }
}

impl Dispatch {
    async fn dispatch(
        &self,
        stream: tokio::net::TcpStream,
        peer_addr: std::net::SocketAddr,
        permit: ConnectionPermit,
    ) {
        let (protocol, conn) = match self.classifier.classify(stream, peer_addr).await {
            Ok(classified) => classified,
            Err(e) => {
                metrics::record_classify_failure();
                tracing::debug!(error = %e, "Classification abandoned");
                return;
            }
        };
        metrics::record_connection(protocol);
        let conn = conn.with_permit(permit);

        match protocol {
            Protocol::Ssh => self.passthrough(conn).await,
            Protocol::Http => self.handoff(conn).await,
        }
    }

    async fn passthrough(&self, conn: ClassifiedConnection) {
        let id = conn.id();
        match self.passthrough.serve(conn).await {
            Ok(stats) => tracing::debug!(
                connection_id = %id,
                to_upstream = stats.to_upstream,
                to_client = stats.to_client,
                "Passthrough finished"
            ),
            Err(e) => tracing::warn!(
                connection_id = %id,
                upstream = %self.passthrough.upstream(),
                error = %e,
                "Passthrough upstream unreachable"
            ),
        }
    }

    async fn handoff(&self, conn: ClassifiedConnection) {
        if let Err(conn) = self.handoff.send(conn).await {
            tracing::debug!(connection_id = %conn.id(), "HTTP server gone; dropping connection");
        }
    }
}

//! Listener adapter over a handoff queue.
//!
//! Connections are accepted and classified by the multiplexer; the ones that
//! turn out to be HTTP are pushed through a bounded queue into a
//! [`ProxyListener`], which the HTTP server consumes like any other listener.
//! The bytes read during classification travel with each connection.

use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::net::connection::ClassifiedConnection;
use crate::net::listener::ListenerError;

/// Create a connected sender/listener pair.
///
/// `addr` is the bound address of the real socket the listener stands in for.
/// The listener closes when `closed` is cancelled.
pub fn channel(
    addr: SocketAddr,
    backlog: usize,
    closed: CancellationToken,
) -> (Handoff, ProxyListener) {
    let (tx, rx) = mpsc::channel(backlog.max(1));
    (
        Handoff { tx },
        ProxyListener {
            addr,
            connections: rx,
            closed,
        },
    )
}

/// Sending half, held by the dispatcher.
#[derive(Debug, Clone)]
pub struct Handoff {
    tx: mpsc::Sender<ClassifiedConnection>,
}

impl Handoff {
    /// Queue a connection for the HTTP server.
    ///
    /// Waits while the queue is full. If the listener is gone the connection
    /// is returned so the caller decides how to dispose of it.
    pub async fn send(&self, conn: ClassifiedConnection) -> Result<(), ClassifiedConnection> {
        self.tx.send(conn).await.map_err(|err| err.0)
    }
}

/// A listener whose connections come from a [`Handoff`] instead of a socket.
#[derive(Debug)]
pub struct ProxyListener {
    addr: SocketAddr,
    connections: mpsc::Receiver<ClassifiedConnection>,
    closed: CancellationToken,
}

impl ProxyListener {
    /// Wait for the next handed-off connection.
    ///
    /// Fails with [`ListenerError::Closed`] once [`close`](Self::close) has
    /// been called or every [`Handoff`] has been dropped.
    pub async fn accept(&mut self) -> Result<ClassifiedConnection, ListenerError> {
        if self.closed.is_cancelled() {
            return Err(ListenerError::Closed);
        }

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(ListenerError::Closed),
            conn = self.connections.recv() => conn.ok_or(ListenerError::Closed),
        }
    }

    /// Stop handing out connections. Safe to call more than once.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Address of the underlying socket.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl axum::serve::Listener for ProxyListener {
    type Io = ClassifiedConnection;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        match ProxyListener::accept(self).await {
            Ok(conn) => {
                let peer = conn.peer_addr();
                (conn, peer)
            }
            Err(_) => {
                // axum's accept cannot fail; a closed listener simply never
                // yields again and the server's graceful shutdown ends the loop.
                tracing::debug!(address = %self.addr, "Handoff listener closed");
                std::future::pending().await
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        Ok(self.addr)
    }
}

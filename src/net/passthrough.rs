//! Raw TCP passthrough.
//!
//! # Responsibilities
//! - Dial the configured upstream for a classified connection
//! - Copy bytes in both directions until each side reaches EOF
//! - Close both connections once both directions are done
//!
//! # Design Decisions
//! - Directions are independent: EOF or an error stops one direction and
//!   half-closes its destination, the other keeps draining
//! - The session is not tied to the server's cancellation; it ends when the
//!   client and upstream are done with each other

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::PassthroughConfig;
use crate::net::connection::ClassifiedConnection;
use crate::observability::metrics;

/// Bytes moved during one passthrough session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassthroughStats {
    /// Client → upstream, including the replayed prefix.
    pub to_upstream: u64,
    /// Upstream → client.
    pub to_client: u64,
}

/// Dials a fixed upstream for every connection handed to it.
#[derive(Debug, Clone)]
pub struct Passthrough {
    upstream: String,
    connect_timeout: Duration,
}

impl Passthrough {
    pub fn new(upstream: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            upstream: upstream.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &PassthroughConfig) -> Self {
        Self::new(config.upstream.clone(), config.connect_timeout())
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Dial the upstream and proxy `client` to it.
    ///
    /// A dial failure is returned after `client` has been dropped (closed);
    /// no bytes are copied in that case.
    pub async fn serve(&self, client: ClassifiedConnection) -> io::Result<PassthroughStats> {
        let dial = TcpStream::connect(&self.upstream);
        let upstream = match tokio::time::timeout(self.connect_timeout, dial).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                drop(client);
                return Err(e);
            }
            Err(_) => {
                drop(client);
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {} timed out", self.upstream),
                ));
            }
        };

        tracing::debug!(
            connection_id = %client.id(),
            upstream = %self.upstream,
            "Passthrough connected"
        );

        let stats = proxy(client, upstream).await;
        metrics::record_passthrough_bytes(stats.to_upstream, stats.to_client);
        Ok(stats)
    }
}

/// Copy bytes both ways between `client` and `upstream`.
///
/// Returns once both directions have finished; both streams are closed when
/// they are dropped on return.
pub async fn proxy<C, U>(client: C, upstream: U) -> PassthroughStats
where
    C: AsyncRead + AsyncWrite,
    U: AsyncRead + AsyncWrite,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (upstream_read, upstream_write) = tokio::io::split(upstream);

    let (to_upstream, to_client) = tokio::join!(
        pipe(client_read, upstream_write, "to_upstream"),
        pipe(upstream_read, client_write, "to_client"),
    );

    PassthroughStats {
        to_upstream,
        to_client,
    }
}

/// Copy until EOF or error, then half-close the destination.
async fn pipe<R, W>(mut from: R, mut to: W, direction: &'static str) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut copied = 0u64;
    let mut buf = vec![0u8; 16 * 1024];

    loop {
        let n = match from.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(direction, error = %e, "Passthrough read ended");
                break;
            }
        };
        if let Err(e) = to.write_all(&buf[..n]).await {
            tracing::debug!(direction, error = %e, "Passthrough write ended");
            break;
        }
        copied += n as u64;
    }

    let _ = to.shutdown().await;
    copied
}

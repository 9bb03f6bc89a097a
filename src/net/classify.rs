//! Protocol classification by leading bytes.
//!
//! # Responsibilities
//! - Read a bounded prefix of a freshly accepted connection
//! - Match the prefix against known protocol signatures
//! - Hand back a `ClassifiedConnection` that replays everything read
//!
//! # Design Decisions
//! - At least `peek_bytes` are read; more may arrive in the same read and are
//!   kept as well, so nothing is ever lost
//! - A connection that closes before `peek_bytes` arrive is abandoned, even if
//!   the partial prefix could still have matched
//! - The initial read is bounded by a timeout

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::config::ClassifierConfig;
use crate::net::connection::ClassifiedConnection;

/// Upper bound on `peek_bytes`.
pub const MAX_PEEK_BYTES: usize = 4096;

/// Size of each read while filling the prefix.
const READ_CHUNK: usize = 4096;

/// Protocol class of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// SSH handshake banner; dispatched to the passthrough proxy.
    Ssh,
    /// Anything else; dispatched to the HTTP server.
    Http,
}

/// Known signatures, checked in order. No match means HTTP.
const SIGNATURES: &[(&[u8], Protocol)] = &[(b"SSH-2.0", Protocol::Ssh)];

impl Protocol {
    /// Classify a prefix of a byte stream.
    pub fn detect(prefix: &[u8]) -> Self {
        SIGNATURES
            .iter()
            .find(|(signature, _)| prefix.starts_with(signature))
            .map(|(_, protocol)| *protocol)
            .unwrap_or(Protocol::Http)
    }

    /// Length of the longest known signature; the classifier must read at
    /// least this many bytes.
    pub fn longest_signature() -> usize {
        SIGNATURES.iter().map(|(signature, _)| signature.len()).max().unwrap_or(0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Ssh => "ssh",
            Protocol::Http => "http",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons classification was abandoned.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The peer closed before enough bytes arrived.
    #[error("connection closed after {received} of {wanted} bytes")]
    Closed { received: usize, wanted: usize },

    /// The peer sent too little within the timeout.
    #[error("no protocol signature within {0:?}")]
    Timeout(Duration),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads the leading bytes of a connection and decides its protocol.
#[derive(Debug, Clone)]
pub struct Classifier {
    peek_bytes: usize,
    timeout: Duration,
}

impl Classifier {
    pub fn new(peek_bytes: usize, timeout: Duration) -> Self {
        Self {
            peek_bytes: peek_bytes.clamp(Protocol::longest_signature(), MAX_PEEK_BYTES),
            timeout,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(config.peek_bytes, config.peek_timeout())
    }

    /// Read at least `peek_bytes` from `stream` and classify them.
    ///
    /// On error the stream is dropped, which closes it.
    pub async fn classify(
        &self,
        mut stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(Protocol, ClassifiedConnection), ClassifyError> {
        let peeked = tokio::time::timeout(self.timeout, self.fill(&mut stream))
            .await
            .map_err(|_| ClassifyError::Timeout(self.timeout))??;

        let protocol = Protocol::detect(&peeked);
        tracing::debug!(
            peer_addr = %peer_addr,
            protocol = %protocol,
            peeked = peeked.len(),
            "Connection classified"
        );

        Ok((protocol, ClassifiedConnection::new(stream, peeked, peer_addr)))
    }

    async fn fill(&self, stream: &mut TcpStream) -> Result<Vec<u8>, ClassifyError> {
        let mut peeked = Vec::with_capacity(self.peek_bytes);
        let mut chunk = vec![0u8; READ_CHUNK];

        while peeked.len() < self.peek_bytes {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(ClassifyError::Closed {
                    received: peeked.len(),
                    wanted: self.peek_bytes,
                });
            }
            peeked.extend_from_slice(&chunk[..n]);
        }

        Ok(peeked)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}

//! Classified connections.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Replay bytes consumed during classification before reading the socket
//! - Hold the connection-limit permit for as long as the connection lives
//!
//! # Design Decisions
//! - The peeked buffer is composed with the stream, not layered as a reader
//! - Writes, flushes and shutdowns go straight to the socket
//! - Exactly one owner: the value is moved into either the passthrough
//!   proxy or the HTTP handoff queue, never shared

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::net::listener::ConnectionPermit;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A TCP connection plus the bytes already read from it during
/// classification.
///
/// Reads return the peeked bytes first, in order, and then fall through to
/// the socket, so a consumer observes the stream as if nothing had been read.
#[derive(Debug)]
pub struct ClassifiedConnection {
    stream: TcpStream,
    peeked: Vec<u8>,
    cursor: usize,
    peer_addr: SocketAddr,
    id: ConnectionId,
    _permit: Option<ConnectionPermit>,
}

impl ClassifiedConnection {
    /// Wrap `stream`, replaying `peeked` ahead of any further reads.
    pub fn new(stream: TcpStream, peeked: Vec<u8>, peer_addr: SocketAddr) -> Self {
        Self {
            stream,
            peeked,
            cursor: 0,
            peer_addr,
            id: ConnectionId::new(),
            _permit: None,
        }
    }

    /// Attach the connection-limit permit; it is released on drop.
    pub fn with_permit(mut self, permit: ConnectionPermit) -> Self {
        self._permit = Some(permit);
        self
    }

    /// Bytes read during classification, including any already replayed.
    pub fn peeked(&self) -> &[u8] {
        &self.peeked
    }

    /// Peeked bytes not yet handed to a reader.
    pub fn pending(&self) -> &[u8] {
        &self.peeked[self.cursor..]
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl AsyncRead for ClassifiedConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.cursor < self.peeked.len() && buf.remaining() > 0 {
            let end = self.peeked.len().min(self.cursor + buf.remaining());
            buf.put_slice(&self.peeked[self.cursor..end]);
            self.cursor = end;
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for ClassifiedConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, data)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.stream.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn peeked_bytes_come_first_then_socket() {
        let (mut client, server) = socket_pair().await;
        let peer = client.local_addr().unwrap();
        let mut conn = ClassifiedConnection::new(server, b"GET / HT".to_vec(), peer);

        client.write_all(b"TP/1.1\r\n\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        conn.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"GET / HTTP/1.1\r\n\r\n");
    }

    #[tokio::test]
    async fn small_reads_drain_peeked_bytes_in_order() {
        let (mut client, server) = socket_pair().await;
        let peer = client.local_addr().unwrap();
        let mut conn = ClassifiedConnection::new(server, b"SSH-2.0-x".to_vec(), peer);

        let mut chunk = [0u8; 4];
        let n = conn.read(&mut chunk).await.unwrap();
        assert_eq!(&chunk[..n], b"SSH-");
        assert_eq!(conn.pending(), b"2.0-x");

        let n = conn.read(&mut chunk).await.unwrap();
        assert_eq!(&chunk[..n], b"2.0-");
        let n = conn.read(&mut chunk).await.unwrap();
        assert_eq!(&chunk[..n], b"x");
        assert!(conn.pending().is_empty());

        client.write_all(b"rest").await.unwrap();
        let n = conn.read(&mut chunk).await.unwrap();
        assert_eq!(&chunk[..n], b"rest");
    }

    #[tokio::test]
    async fn writes_pass_through() {
        let (mut client, server) = socket_pair().await;
        let peer = client.local_addr().unwrap();
        let mut conn = ClassifiedConnection::new(server, b"ignored".to_vec(), peer);

        conn.write_all(b"hello").await.unwrap();
        conn.shutdown().await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"hello");
    }
}

//! Raw connections to switches.
//!
//! A [`Connection`] wraps any bidirectional byte stream (TCP in production,
//! in-memory pipes in tests), split into a decoded inbound [`MessageStream`]
//! and a writer half.

use crate::error::SessionError;
use crate::stream::{write_message, MessageStream};
use ofp_wire::Message;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

/// Type-erased read half
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Type-erased write half
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An accepted connection that has not been handed to a session yet
pub struct Connection {
    peer: String,
    stream: MessageStream,
    writer: BoxedWriter,
}

impl Connection {
    /// Wrap a byte stream
    pub fn new<S>(io: S, peer: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        Self {
            peer: peer.into(),
            stream: MessageStream::new(Box::new(reader)),
            writer: Box::new(writer),
        }
    }

    /// Wrap an accepted TCP stream, labelled with its peer address
    pub fn from_tcp(stream: TcpStream) -> std::io::Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, peer.to_string()))
    }

    /// Peer label used in logs
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write one message
    pub async fn send(&mut self, message: &Message) -> Result<(), SessionError> {
        write_message(&mut self.writer, message).await
    }

    /// Read the next message; `None` once the peer has closed
    pub async fn recv(&mut self) -> Result<Option<Message>, SessionError> {
        self.stream.next_message().await
    }

    /// Shut down the write side and release both halves
    pub async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Shutdown of connection to {} failed: {}", self.peer, e);
        }
    }

    pub(crate) fn into_parts(self) -> (String, MessageStream, BoxedWriter) {
        (self.peer, self.stream, self.writer)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("peer", &self.peer).finish()
    }
}

/// Create a TCP listener bound to the given address
pub async fn listen_tcp(addr: SocketAddr) -> tokio::io::Result<TcpListener> {
    TcpListener::bind(addr).await
}

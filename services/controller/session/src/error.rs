//! Error types for the session core.

use crate::handshake::HandshakeState;
use ofp_wire::{DatapathId, WireError};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of session operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session was disconnected and its outbound queue closed
    #[error("session {0} is closed")]
    Closed(DatapathId),

    /// A live waiter is already registered for this transaction id
    #[error("transaction {0:#x} already has a pending waiter")]
    DuplicateXid(u32),

    /// Protocol error
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Transport error
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a connection failed to become a registered session
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Peer closed the connection
    #[error("connection closed in state {0}")]
    Closed(HandshakeState),

    /// Transport error
    #[error("i/o error in state {state}: {source}")]
    Io {
        /// State the handshake was in
        state: HandshakeState,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Unexpected or malformed message
    #[error("protocol error in state {state}: {source}")]
    Wire {
        /// State the handshake was in
        state: HandshakeState,
        /// Underlying error
        #[source]
        source: WireError,
    },

    /// Peer announced a version we cannot speak
    #[error("unsupported peer version {0}")]
    Version(u8),

    /// The whole exchange took longer than the configured timeout
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),
}

impl HandshakeError {
    pub(crate) fn at(state: HandshakeState, err: SessionError) -> Self {
        match err {
            SessionError::Io(source) => HandshakeError::Io { state, source },
            SessionError::Wire(source) => HandshakeError::Wire { state, source },
            SessionError::Closed(_) | SessionError::DuplicateXid(_) => HandshakeError::Closed(state),
        }
    }
}

//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Incomplete message (need more data)
    #[error("incomplete message")]
    Incomplete,

    /// Unsupported protocol version
    #[error("version unsupported: {0}")]
    Version(u8),

    /// Declared length smaller than the header or larger than a u16 allows
    #[error("bad length: {0}")]
    Length(usize),

    /// Body does not belong to the expected message type
    #[error("expected {expected} body, got {actual}")]
    UnexpectedType {
        /// Type the parser was asked for
        expected: &'static str,
        /// Type actually present in the header
        actual: &'static str,
    },

    /// Unknown port status reason
    #[error("unknown port status reason {0}")]
    Reason(u8),

    /// Malformed datapath id string
    #[error("invalid datapath id: {0}")]
    DatapathId(String),

    /// Malformed message body
    #[error("malformed message")]
    Malformed,
}

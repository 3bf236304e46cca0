//! Incremental decoding of the control channel byte stream.

use crate::header::{Header, HEADER_SIZE};
use crate::message::Message;
use bytes::{Buf, BytesMut};
use tracing::trace;

/// Message decoder for parsing incoming messages
///
/// The decoder only keeps a counter; partially received
/// messages stay in the caller's buffer until the rest arrives.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    decoded: u64,
}

impl MessageDecoder {
    /// Create a new message decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages decoded so far
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Decode one message from a buffer
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, crate::WireError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        // Peek without consuming so a short read leaves the buffer intact
        let header = Header::decode(&mut &buf[..HEADER_SIZE])?;
        let length = header.length as usize;

        if buf.len() < length {
            return Ok(None);
        }

        buf.advance(HEADER_SIZE);
        let payload = buf.split_to(length - HEADER_SIZE).freeze();
        self.decoded += 1;

        trace!(
            "Decoded {} (xid {}, {} bytes)",
            header.typ,
            header.xid,
            length
        );

        Ok(Some(Message { header, payload }))
    }
}

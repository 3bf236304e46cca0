//! Generic message envelope.
//!
//! A [`Message`] is a decoded header plus the raw body bytes. The session core
//! routes on the header alone; typed bodies are parsed on demand by
//! [`crate::FeaturesReply`] and [`crate::PortStatus`].

use crate::dpid::DatapathId;
use crate::header::{Header, MessageType, HEADER_SIZE};
use bytes::{Bytes, BytesMut};

/// One OpenFlow message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message header
    pub header: Header,
    /// Body following the header
    pub payload: Bytes,
}

impl Message {
    /// Create a message, filling in version and length
    pub fn new(typ: MessageType, xid: u32, payload: Bytes) -> Self {
        let mut header = Header::new(typ, xid);
        header.length = (HEADER_SIZE + payload.len()).min(u16::MAX as usize) as u16;
        Self { header, payload }
    }

    /// HELLO with an empty body
    pub fn hello(xid: u32) -> Self {
        Self::new(MessageType::Hello, xid, Bytes::new())
    }

    /// FEATURES_REQUEST
    pub fn features_request(xid: u32) -> Self {
        Self::new(MessageType::FeaturesRequest, xid, Bytes::new())
    }

    /// ECHO_REQUEST carrying arbitrary data
    pub fn echo_request(xid: u32, data: Bytes) -> Self {
        Self::new(MessageType::EchoRequest, xid, data)
    }

    /// ECHO_REPLY answering `request` with the same xid and data
    pub fn echo_reply(request: &Message) -> Self {
        Self::new(
            MessageType::EchoReply,
            request.header.xid,
            request.payload.clone(),
        )
    }

    /// Transaction id
    pub fn xid(&self) -> u32 {
        self.header.xid
    }

    /// Message type
    pub fn typ(&self) -> MessageType {
        self.header.typ
    }

    /// Fail unless the header carries `typ`
    pub fn expect_type(&self, typ: MessageType) -> Result<(), crate::WireError> {
        if self.header.typ == typ {
            Ok(())
        } else {
            Err(crate::WireError::UnexpectedType {
                expected: typ.name(),
                actual: self.header.typ.name(),
            })
        }
    }

    /// Encoded size on the wire
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Encode to a contiguous buffer
    pub fn encode(&self) -> Result<Bytes, crate::WireError> {
        let total = self.encoded_size();
        if total > u16::MAX as usize {
            return Err(crate::WireError::Length(total));
        }

        let mut header = self.header;
        header.length = total as u16;

        let mut buf = BytesMut::with_capacity(total);
        header.encode(&mut buf);
        buf.extend_from_slice(&self.payload);
        Ok(buf.freeze())
    }
}

/// A decoded message paired with the switch it arrived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchMessage {
    /// Originating switch
    pub dpid: DatapathId,
    /// The message itself
    pub message: Message,
}

impl SwitchMessage {
    /// Pair a message with its origin
    pub fn new(dpid: DatapathId, message: Message) -> Self {
        Self { dpid, message }
    }
}

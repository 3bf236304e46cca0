//! OpenFlow 1.0 message header.
//!
//! Every message on the control channel starts with the same 8-byte header:
//! version, type, total length and transaction id, all big-endian. This is
//! the only part of a message the session core looks at when routing.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Protocol version spoken by the controller (OpenFlow 1.0)
pub const OFP_VERSION: u8 = 0x01;

/// Header size in bytes
pub const HEADER_SIZE: usize = 8;

/// Message types as defined by OpenFlow 1.0
///
/// Type bytes outside the 1.0 table decode to [`MessageType::Unknown`] so a
/// vendor or newer-version message does not break framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Symmetric version negotiation
    Hello,
    /// Error notification
    Error,
    /// Keepalive request
    EchoRequest,
    /// Keepalive reply
    EchoReply,
    /// Vendor extension
    Vendor,
    /// Controller asks for switch identity and ports
    FeaturesRequest,
    /// Switch identity and ports
    FeaturesReply,
    /// Configuration query
    GetConfigRequest,
    /// Configuration answer
    GetConfigReply,
    /// Configuration update
    SetConfig,
    /// Packet punted to the controller
    PacketIn,
    /// Flow entry expired or was deleted
    FlowRemoved,
    /// Port added, removed or modified
    PortStatus,
    /// Packet injected by the controller
    PacketOut,
    /// Flow table modification
    FlowMod,
    /// Port behaviour modification
    PortMod,
    /// Statistics query
    StatsRequest,
    /// Statistics answer
    StatsReply,
    /// Barrier request
    BarrierRequest,
    /// Barrier reply
    BarrierReply,
    /// Queue configuration query
    QueueGetConfigRequest,
    /// Queue configuration answer
    QueueGetConfigReply,
    /// Type byte not defined by OpenFlow 1.0
    Unknown(u8),
}

impl MessageType {
    /// Human readable name, used in logs and errors
    pub fn name(self) -> &'static str {
        match self {
            MessageType::Hello => "HELLO",
            MessageType::Error => "ERROR",
            MessageType::EchoRequest => "ECHO_REQUEST",
            MessageType::EchoReply => "ECHO_REPLY",
            MessageType::Vendor => "VENDOR",
            MessageType::FeaturesRequest => "FEATURES_REQUEST",
            MessageType::FeaturesReply => "FEATURES_REPLY",
            MessageType::GetConfigRequest => "GET_CONFIG_REQUEST",
            MessageType::GetConfigReply => "GET_CONFIG_REPLY",
            MessageType::SetConfig => "SET_CONFIG",
            MessageType::PacketIn => "PACKET_IN",
            MessageType::FlowRemoved => "FLOW_REMOVED",
            MessageType::PortStatus => "PORT_STATUS",
            MessageType::PacketOut => "PACKET_OUT",
            MessageType::FlowMod => "FLOW_MOD",
            MessageType::PortMod => "PORT_MOD",
            MessageType::StatsRequest => "STATS_REQUEST",
            MessageType::StatsReply => "STATS_REPLY",
            MessageType::BarrierRequest => "BARRIER_REQUEST",
            MessageType::BarrierReply => "BARRIER_REPLY",
            MessageType::QueueGetConfigRequest => "QUEUE_GET_CONFIG_REQUEST",
            MessageType::QueueGetConfigReply => "QUEUE_GET_CONFIG_REPLY",
            MessageType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Unknown(value) => write!(f, "UNKNOWN({})", value),
            known => f.write_str(known.name()),
        }
    }
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        match value {
            0 => MessageType::Hello,
            1 => MessageType::Error,
            2 => MessageType::EchoRequest,
            3 => MessageType::EchoReply,
            4 => MessageType::Vendor,
            5 => MessageType::FeaturesRequest,
            6 => MessageType::FeaturesReply,
            7 => MessageType::GetConfigRequest,
            8 => MessageType::GetConfigReply,
            9 => MessageType::SetConfig,
            10 => MessageType::PacketIn,
            11 => MessageType::FlowRemoved,
            12 => MessageType::PortStatus,
            13 => MessageType::PacketOut,
            14 => MessageType::FlowMod,
            15 => MessageType::PortMod,
            16 => MessageType::StatsRequest,
            17 => MessageType::StatsReply,
            18 => MessageType::BarrierRequest,
            19 => MessageType::BarrierReply,
            20 => MessageType::QueueGetConfigRequest,
            21 => MessageType::QueueGetConfigReply,
            other => MessageType::Unknown(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(typ: MessageType) -> Self {
        match typ {
            MessageType::Hello => 0,
            MessageType::Error => 1,
            MessageType::EchoRequest => 2,
            MessageType::EchoReply => 3,
            MessageType::Vendor => 4,
            MessageType::FeaturesRequest => 5,
            MessageType::FeaturesReply => 6,
            MessageType::GetConfigRequest => 7,
            MessageType::GetConfigReply => 8,
            MessageType::SetConfig => 9,
            MessageType::PacketIn => 10,
            MessageType::FlowRemoved => 11,
            MessageType::PortStatus => 12,
            MessageType::PacketOut => 13,
            MessageType::FlowMod => 14,
            MessageType::PortMod => 15,
            MessageType::StatsRequest => 16,
            MessageType::StatsReply => 17,
            MessageType::BarrierRequest => 18,
            MessageType::BarrierReply => 19,
            MessageType::QueueGetConfigRequest => 20,
            MessageType::QueueGetConfigReply => 21,
            MessageType::Unknown(value) => value,
        }
    }
}

/// OpenFlow message header (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Protocol version
    pub version: u8,
    /// Message type
    pub typ: MessageType,
    /// Total message length including this header
    pub length: u16,
    /// Transaction id, echoed by the peer on replies
    pub xid: u32,
}

impl Header {
    /// Create a header for an empty-bodied message
    pub fn new(typ: MessageType, xid: u32) -> Self {
        Self {
            version: OFP_VERSION,
            typ,
            length: HEADER_SIZE as u16,
            xid,
        }
    }

    /// Encode the header to bytes (big-endian)
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_u8(self.typ.into());
        buf.put_u16(self.length);
        buf.put_u32(self.xid);
    }

    /// Decode the header from bytes (big-endian)
    ///
    /// The version is not checked here: a peer HELLO may legitimately carry a
    /// newer version, and negotiation is the handshake's job.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, crate::WireError> {
        if buf.remaining() < HEADER_SIZE {
            return Err(crate::WireError::Incomplete);
        }

        let version = buf.get_u8();
        let typ = MessageType::from(buf.get_u8());
        let length = buf.get_u16();
        let xid = buf.get_u32();

        if (length as usize) < HEADER_SIZE {
            return Err(crate::WireError::Length(length as usize));
        }

        Ok(Self {
            version,
            typ,
            length,
            xid,
        })
    }

    /// Length of the body that follows the header
    pub fn body_len(&self) -> usize {
        (self.length as usize).saturating_sub(HEADER_SIZE)
    }
}

static NEXT_XID: AtomicU32 = AtomicU32::new(1);

/// Allocate a fresh transaction id.
///
/// Ids are process-wide and monotonically increasing; zero is skipped on
/// wraparound because switches use it for unsolicited messages.
pub fn next_xid() -> u32 {
    loop {
        let xid = NEXT_XID.fetch_add(1, Ordering::Relaxed);
        if xid != 0 {
            return xid;
        }
    }
}

//! Physical port descriptors and port status notifications.

use crate::header::MessageType;
use crate::message::Message;
use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Encoded size of a physical port descriptor
pub const PHY_PORT_SIZE: usize = 48;

/// Maximum port name length on the wire (including NUL padding)
pub const PORT_NAME_LEN: usize = 16;

bitflags! {
    /// Administrative port configuration
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PortConfig: u32 {
        /// Port is administratively down
        const PORT_DOWN = 1 << 0;
        /// Disable 802.1D spanning tree on port
        const NO_STP = 1 << 1;
        /// Drop all packets except 802.1D spanning tree packets
        const NO_RECV = 1 << 2;
        /// Drop received 802.1D STP packets
        const NO_RECV_STP = 1 << 3;
        /// Do not include this port when flooding
        const NO_FLOOD = 1 << 4;
        /// Drop packets forwarded to port
        const NO_FWD = 1 << 5;
        /// Do not send packet-in messages for port
        const NO_PACKET_IN = 1 << 6;
    }
}

bitflags! {
    /// Operational port state
    ///
    /// Bits 8-9 hold a two-bit spanning tree state rather than independent
    /// flags; read it with [`PortState::stp_state`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PortState: u32 {
        /// No physical link present
        const LINK_DOWN = 1 << 0;
        /// Mask of the spanning tree state field
        const STP_MASK = 3 << 8;
    }
}

/// Spanning tree state of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StpState {
    /// Not learning or relaying frames
    Listen,
    /// Learning but not relaying frames
    Learn,
    /// Learning and relaying frames
    Forward,
    /// Not part of spanning tree
    Block,
}

impl PortState {
    /// Spanning tree state carried in bits 8-9
    pub fn stp_state(self) -> StpState {
        match (self.bits() & Self::STP_MASK.bits()) >> 8 {
            0 => StpState::Listen,
            1 => StpState::Learn,
            2 => StpState::Forward,
            _ => StpState::Block,
        }
    }

    /// Same state with the spanning tree field replaced
    pub fn with_stp_state(self, stp: StpState) -> Self {
        let field = match stp {
            StpState::Listen => 0,
            StpState::Learn => 1,
            StpState::Forward => 2,
            StpState::Block => 3,
        };
        Self::from_bits_retain((self.bits() & !Self::STP_MASK.bits()) | (field << 8))
    }
}

bitflags! {
    /// Port features (current, advertised, supported, peer)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PortFeatures: u32 {
        /// 10 Mb half-duplex
        const HD_10MB = 1 << 0;
        /// 10 Mb full-duplex
        const FD_10MB = 1 << 1;
        /// 100 Mb half-duplex
        const HD_100MB = 1 << 2;
        /// 100 Mb full-duplex
        const FD_100MB = 1 << 3;
        /// 1 Gb half-duplex
        const HD_1GB = 1 << 4;
        /// 1 Gb full-duplex
        const FD_1GB = 1 << 5;
        /// 10 Gb full-duplex
        const FD_10GB = 1 << 6;
        /// Copper medium
        const COPPER = 1 << 7;
        /// Fiber medium
        const FIBER = 1 << 8;
        /// Auto-negotiation
        const AUTONEG = 1 << 9;
        /// Pause
        const PAUSE = 1 << 10;
        /// Asymmetric pause
        const PAUSE_ASYM = 1 << 11;
    }
}

/// Physical port descriptor as reported by the switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhyPort {
    /// Port number
    pub port_no: u16,
    /// Port hardware address
    pub hw_addr: [u8; 6],
    /// Interface name
    pub name: String,
    /// Administrative configuration
    pub config: PortConfig,
    /// Operational state
    pub state: PortState,
    /// Current features
    pub curr: PortFeatures,
    /// Features advertised by the port
    pub advertised: PortFeatures,
    /// Features supported by the port
    pub supported: PortFeatures,
    /// Features advertised by the peer
    pub peer: PortFeatures,
}

impl PhyPort {
    /// Create a port descriptor with empty flag sets
    pub fn new(port_no: u16, hw_addr: [u8; 6], name: impl Into<String>) -> Self {
        Self {
            port_no,
            hw_addr,
            name: name.into(),
            config: PortConfig::empty(),
            state: PortState::empty(),
            curr: PortFeatures::empty(),
            advertised: PortFeatures::empty(),
            supported: PortFeatures::empty(),
            peer: PortFeatures::empty(),
        }
    }

    /// Port is administratively up and has a link
    pub fn is_up(&self) -> bool {
        !self.config.contains(PortConfig::PORT_DOWN) && !self.state.contains(PortState::LINK_DOWN)
    }

    /// Encode the descriptor (48 bytes)
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.port_no);
        buf.put_slice(&self.hw_addr);

        let mut name = [0u8; PORT_NAME_LEN];
        let raw = self.name.as_bytes();
        // Keep at least one trailing NUL
        let n = raw.len().min(PORT_NAME_LEN - 1);
        name[..n].copy_from_slice(&raw[..n]);
        buf.put_slice(&name);

        buf.put_u32(self.config.bits());
        buf.put_u32(self.state.bits());
        buf.put_u32(self.curr.bits());
        buf.put_u32(self.advertised.bits());
        buf.put_u32(self.supported.bits());
        buf.put_u32(self.peer.bits());
    }

    /// Decode one descriptor
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, crate::WireError> {
        if buf.remaining() < PHY_PORT_SIZE {
            return Err(crate::WireError::Malformed);
        }

        let port_no = buf.get_u16();
        let mut hw_addr = [0u8; 6];
        buf.copy_to_slice(&mut hw_addr);

        let mut name_raw = [0u8; PORT_NAME_LEN];
        buf.copy_to_slice(&mut name_raw);
        let end = name_raw.iter().position(|&b| b == 0).unwrap_or(PORT_NAME_LEN);
        let name = String::from_utf8_lossy(&name_raw[..end]).into_owned();

        Ok(Self {
            port_no,
            hw_addr,
            name,
            config: PortConfig::from_bits_retain(buf.get_u32()),
            state: PortState::from_bits_retain(buf.get_u32()),
            curr: PortFeatures::from_bits_retain(buf.get_u32()),
            advertised: PortFeatures::from_bits_retain(buf.get_u32()),
            supported: PortFeatures::from_bits_retain(buf.get_u32()),
            peer: PortFeatures::from_bits_retain(buf.get_u32()),
        })
    }
}

/// Why a port status message was sent
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortReason {
    /// Port was added
    Add = 0,
    /// Port was removed
    Delete = 1,
    /// Some attribute of the port changed
    Modify = 2,
}

impl TryFrom<u8> for PortReason {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PortReason::Add),
            1 => Ok(PortReason::Delete),
            2 => Ok(PortReason::Modify),
            _ => Err(crate::WireError::Reason(value)),
        }
    }
}

/// PORT_STATUS body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStatus {
    /// Reason for the notification
    pub reason: PortReason,
    /// Port descriptor after the change
    pub desc: PhyPort,
}

impl PortStatus {
    /// Parse the body of a PORT_STATUS message
    pub fn from_message(message: &Message) -> Result<Self, crate::WireError> {
        message.expect_type(MessageType::PortStatus)?;

        let mut body = message.payload.clone();
        if body.remaining() < 8 + PHY_PORT_SIZE {
            return Err(crate::WireError::Malformed);
        }
        let reason = PortReason::try_from(body.get_u8())?;
        body.advance(7);
        let desc = PhyPort::decode(&mut body)?;

        Ok(Self { reason, desc })
    }

    /// Build a PORT_STATUS message
    pub fn to_message(&self, xid: u32) -> Message {
        let mut body = BytesMut::with_capacity(8 + PHY_PORT_SIZE);
        body.put_u8(self.reason as u8);
        body.put_bytes(0, 7);
        self.desc.encode(&mut body);
        Message::new(MessageType::PortStatus, xid, body.freeze())
    }
}

//! FEATURES_REPLY body: switch identity, capabilities and ports.

use crate::dpid::DatapathId;
use crate::header::MessageType;
use crate::message::Message;
use crate::port::{PhyPort, PHY_PORT_SIZE};
use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Fixed part of the FEATURES_REPLY body preceding the port list
const FEATURES_FIXED_SIZE: usize = 24;

bitflags! {
    /// Switch capabilities
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Capabilities: u32 {
        /// Flow statistics
        const FLOW_STATS = 1 << 0;
        /// Table statistics
        const TABLE_STATS = 1 << 1;
        /// Port statistics
        const PORT_STATS = 1 << 2;
        /// 802.1D spanning tree
        const STP = 1 << 3;
        /// Reserved, must be zero
        const RESERVED = 1 << 4;
        /// Can reassemble IP fragments
        const IP_REASM = 1 << 5;
        /// Queue statistics
        const QUEUE_STATS = 1 << 6;
        /// Match IP addresses in ARP packets
        const ARP_MATCH_IP = 1 << 7;
    }
}

/// Parsed FEATURES_REPLY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturesReply {
    /// Transaction id of the reply
    pub xid: u32,
    /// Protocol version the switch answered with
    pub version: u8,
    /// Switch identity
    pub datapath_id: DatapathId,
    /// Packets the switch can buffer at once
    pub n_buffers: u32,
    /// Number of flow tables
    pub n_tables: u8,
    /// Capability bits
    pub capabilities: Capabilities,
    /// Supported action bitmap
    pub actions: u32,
    /// Physical ports
    pub ports: Vec<PhyPort>,
}

impl FeaturesReply {
    /// Parse a FEATURES_REPLY message
    pub fn from_message(message: &Message) -> Result<Self, crate::WireError> {
        message.expect_type(MessageType::FeaturesReply)?;

        let mut body = message.payload.clone();
        if body.remaining() < FEATURES_FIXED_SIZE {
            return Err(crate::WireError::Malformed);
        }

        let datapath_id = DatapathId(body.get_u64());
        let n_buffers = body.get_u32();
        let n_tables = body.get_u8();
        body.advance(3);
        let capabilities = Capabilities::from_bits_retain(body.get_u32());
        let actions = body.get_u32();

        if body.remaining() % PHY_PORT_SIZE != 0 {
            return Err(crate::WireError::Malformed);
        }

        let mut ports = Vec::with_capacity(body.remaining() / PHY_PORT_SIZE);
        while body.has_remaining() {
            ports.push(PhyPort::decode(&mut body)?);
        }

        Ok(Self {
            xid: message.header.xid,
            version: message.header.version,
            datapath_id,
            n_buffers,
            n_tables,
            capabilities,
            actions,
            ports,
        })
    }

    /// Build the FEATURES_REPLY message
    pub fn to_message(&self) -> Message {
        let mut body =
            BytesMut::with_capacity(FEATURES_FIXED_SIZE + self.ports.len() * PHY_PORT_SIZE);
        body.put_u64(self.datapath_id.as_u64());
        body.put_u32(self.n_buffers);
        body.put_u8(self.n_tables);
        body.put_bytes(0, 3);
        body.put_u32(self.capabilities.bits());
        body.put_u32(self.actions);
        for port in &self.ports {
            port.encode(&mut body);
        }

        let mut message = Message::new(MessageType::FeaturesReply, self.xid, body.freeze());
        message.header.version = self.version;
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::OFP_VERSION;

    fn reply_with_ports(ports: &[u16]) -> FeaturesReply {
        FeaturesReply {
            xid: 42,
            version: OFP_VERSION,
            datapath_id: DatapathId(0xaabb_ccdd_ee01),
            n_buffers: 256,
            n_tables: 2,
            capabilities: Capabilities::FLOW_STATS | Capabilities::PORT_STATS,
            actions: 0xfff,
            ports: ports
                .iter()
                .map(|&n| PhyPort::new(n, [0x02, 0, 0, 0, 0, n as u8], format!("eth{n}")))
                .collect(),
        }
    }

    #[test]
    fn test_features_reply_message() {
        let reply = reply_with_ports(&[1, 2, 3]);
        let message = reply.to_message();
        assert_eq!(message.header.length as usize, 8 + 24 + 3 * 48);

        let parsed = FeaturesReply::from_message(&message).unwrap();
        assert_eq!(parsed, reply);
        assert_eq!(parsed.datapath_id.to_string(), "00:00:aa:bb:cc:dd:ee:01");
    }

    #[test]
    fn test_features_reply_without_ports() {
        let parsed = FeaturesReply::from_message(&reply_with_ports(&[]).to_message()).unwrap();
        assert!(parsed.ports.is_empty());
    }

    #[test]
    fn test_truncated_port_list() {
        let message = reply_with_ports(&[1]).to_message();
        let truncated = Message::new(
            MessageType::FeaturesReply,
            message.xid(),
            message.payload.slice(..message.payload.len() - 1),
        );
        assert_eq!(
            FeaturesReply::from_message(&truncated),
            Err(crate::WireError::Malformed)
        );
    }

    #[test]
    fn test_wrong_type() {
        assert!(matches!(
            FeaturesReply::from_message(&Message::hello(1)),
            Err(crate::WireError::UnexpectedType { .. })
        ));
    }
}

//! OpenFlow 1.0 headers, message framing, and handshake/port bodies.
//!
//! This crate is the protocol codec used by the controller's session core. It
//! stops at the envelope: every message decodes to a header plus
//! raw body bytes, and only the bodies the session core itself needs
//! (FEATURES_REPLY and PORT_STATUS) have typed parsers.
//!
//! ## Wire Format
//!
//! ```text
//! +---------+---------+-------------+------------------+
//! | u8 ver  | u8 type | u16 length  | u32 xid          |
//! +---------+---------+-------------+------------------+
//! | body (length - 8 bytes)                            |
//! +----------------------------------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod dpid;
pub mod error;
pub mod features;
pub mod header;
pub mod message;
pub mod port;

// Re-export main types
pub use codec::MessageDecoder;
pub use dpid::DatapathId;
pub use error::WireError;
pub use features::{Capabilities, FeaturesReply};
pub use header::{next_xid, Header, MessageType, HEADER_SIZE, OFP_VERSION};
pub use message::{Message, SwitchMessage};
pub use port::{
    PhyPort, PortConfig, PortFeatures, PortReason, PortState, PortStatus, StpState, PHY_PORT_SIZE,
};

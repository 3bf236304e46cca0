//! Adjacency records written by topology discovery.

use ofp_wire::DatapathId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A discovered link from a local switch port to a peer switch port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Switch that owns this record
    pub local: DatapathId,
    /// Switch at the other end
    pub peer: DatapathId,
    /// Port on the local switch
    pub local_port: u16,
    /// Port on the peer switch
    pub peer_port: u16,
    /// Measured one-way latency
    pub latency: Duration,
    /// Link capacity in bits per second, 0 if unknown
    pub bandwidth: u64,
}

impl Link {
    /// Create a link with unknown latency and bandwidth
    pub fn new(local: DatapathId, local_port: u16, peer: DatapathId, peer_port: u16) -> Self {
        Self {
            local,
            peer,
            local_port,
            peer_port,
            latency: Duration::ZERO,
            bandwidth: 0,
        }
    }
}

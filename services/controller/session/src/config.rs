//! Session core configuration.

use std::time::Duration;

/// Default time the router waits on a single recipient before dropping
pub const DEFAULT_DELIVERY_BUDGET: Duration = Duration::from_millis(100);

/// Default bound on the whole HELLO/FEATURES exchange
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration shared by every session of a [`crate::Network`]
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    /// Wait budget per delivery attempt in the router
    pub delivery_budget: Duration,
    /// Bound on session establishment
    pub handshake_timeout: Duration,
    /// Outbound queue capacity per switch; `send` waits when it is full
    pub outbound_queue_depth: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            delivery_budget: DEFAULT_DELIVERY_BUDGET,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            outbound_queue_depth: 1,
        }
    }
}

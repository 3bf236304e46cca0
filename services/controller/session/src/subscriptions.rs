//! Message type subscriptions.
//!
//! Built once before the [`crate::Network`] starts accepting connections and
//! immutable afterwards. Receivers that are dropped stay in the table; the
//! router counts deliveries to them as drops.

use ofp_wire::{MessageType, SwitchMessage};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Message type -> delivery targets
#[derive(Debug, Default, Clone)]
pub struct Subscriptions {
    targets: HashMap<MessageType, Vec<mpsc::Sender<SwitchMessage>>>,
}

impl Subscriptions {
    /// Create an empty subscription table
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `typ` with a bounded channel of `capacity` (at least 1)
    pub fn subscribe(&mut self, typ: MessageType, capacity: usize) -> mpsc::Receiver<SwitchMessage> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.add_target(typ, tx);
        rx
    }

    /// Add an existing channel as a target for `typ`
    pub fn add_target(&mut self, typ: MessageType, target: mpsc::Sender<SwitchMessage>) {
        let targets = self.targets.entry(typ).or_default();
        targets.push(target);
        debug!("Subscriber {} added for {}", targets.len(), typ);
    }

    /// Targets for `typ`, empty if nobody subscribed
    pub fn targets(&self, typ: MessageType) -> &[mpsc::Sender<SwitchMessage>] {
        self.targets.get(&typ).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Message types with at least one target
    pub fn types(&self) -> impl Iterator<Item = MessageType> + '_ {
        self.targets.keys().copied()
    }

    /// Total number of targets across all types
    pub fn len(&self) -> usize {
        self.targets.values().map(Vec::len).sum()
    }

    /// True when nobody subscribed to anything
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_by_type() {
        let mut subs = Subscriptions::new();
        let _a = subs.subscribe(MessageType::PacketIn, 8);
        let _b = subs.subscribe(MessageType::PacketIn, 8);
        let _c = subs.subscribe(MessageType::PortStatus, 0);

        assert_eq!(subs.targets(MessageType::PacketIn).len(), 2);
        assert_eq!(subs.targets(MessageType::PortStatus).len(), 1);
        assert!(subs.targets(MessageType::FlowRemoved).is_empty());
        assert_eq!(subs.len(), 3);
        assert_eq!(subs.types().count(), 2);
    }
}

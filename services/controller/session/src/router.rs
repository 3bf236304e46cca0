//! Inbound message routing.
//!
//! Every message read by a receiver pipeline goes through
//! [`MessageRouter::route`]:
//!
//! 1. If its xid has a pending waiter on the owning session, the waiter is
//!    removed and gets the message. Nothing else sees it.
//! 2. Otherwise the message is offered to every subscriber of its type, one
//!    after another, each offer bounded by the delivery budget.
//!
//! Recipients that are slow or gone cost at most one budget per message;
//! they never stall the receiver. Every drop is counted in [`RouterStats`].

use crate::pending::PendingRequests;
use crate::subscriptions::Subscriptions;
use ofp_wire::SwitchMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::{debug, trace};

/// Outcome of routing one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Matched a pending request; `delivered` is false if the waiter was gone
    Reply {
        /// Whether the waiter received the message
        delivered: bool,
    },
    /// Offered to type subscribers
    Fanout {
        /// Subscribers that accepted the message
        delivered: usize,
        /// Subscribers that timed out or were closed
        dropped: usize,
    },
    /// No waiter and no subscriber for this type
    Unrouted,
}

/// Router counters
#[derive(Debug, Default)]
pub struct RouterStats {
    replies: AtomicU64,
    orphaned_replies: AtomicU64,
    fanout_delivered: AtomicU64,
    dropped_timeout: AtomicU64,
    dropped_closed: AtomicU64,
    unrouted: AtomicU64,
}

/// Point-in-time copy of [`RouterStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStatsSnapshot {
    /// Replies handed to their waiter
    pub replies: u64,
    /// Replies whose waiter had already been dropped
    pub orphaned_replies: u64,
    /// Successful subscriber deliveries
    pub fanout_delivered: u64,
    /// Subscriber deliveries abandoned after the budget
    pub dropped_timeout: u64,
    /// Subscriber deliveries to a closed receiver
    pub dropped_closed: u64,
    /// Messages nobody wanted
    pub unrouted: u64,
}

impl RouterStatsSnapshot {
    /// Total messages dropped for any reason
    pub fn dropped(&self) -> u64 {
        self.orphaned_replies + self.dropped_timeout + self.dropped_closed
    }
}

impl RouterStats {
    /// Copy the current counter values
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            replies: self.replies.load(Ordering::Relaxed),
            orphaned_replies: self.orphaned_replies.load(Ordering::Relaxed),
            fanout_delivered: self.fanout_delivered.load(Ordering::Relaxed),
            dropped_timeout: self.dropped_timeout.load(Ordering::Relaxed),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
        }
    }
}

/// Delivers inbound messages to correlation waiters or subscribers
#[derive(Debug)]
pub struct MessageRouter {
    subscriptions: Subscriptions,
    budget: Duration,
    stats: RouterStats,
}

impl MessageRouter {
    /// Create a router over a fixed subscription table
    pub fn new(subscriptions: Subscriptions, budget: Duration) -> Self {
        Self {
            subscriptions,
            budget,
            stats: RouterStats::default(),
        }
    }

    /// Wait budget per recipient
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Subscription table
    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Counter snapshot
    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Route one message from the session owning `pending`
    pub async fn route(&self, pending: &PendingRequests, message: SwitchMessage) -> Delivery {
        let xid = message.message.xid();
        let typ = message.message.typ();

        // A oneshot send never waits, so the reply path is within budget
        if let Some(waiter) = pending.take(xid) {
            return match waiter.send(message) {
                Ok(()) => {
                    self.stats.replies.fetch_add(1, Ordering::Relaxed);
                    trace!("Delivered {} reply for xid {:#x}", typ, xid);
                    Delivery::Reply { delivered: true }
                }
                Err(message) => {
                    self.stats.orphaned_replies.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "Dropping {} reply from {} for xid {:#x}: waiter gone",
                        typ, message.dpid, xid
                    );
                    Delivery::Reply { delivered: false }
                }
            };
        }

        let targets = self.subscriptions.targets(typ);
        if targets.is_empty() {
            self.stats.unrouted.fetch_add(1, Ordering::Relaxed);
            trace!("No subscriber for {} from {}", typ, message.dpid);
            return Delivery::Unrouted;
        }

        let mut delivered = 0;
        let mut dropped = 0;
        for (index, target) in targets.iter().enumerate() {
            match target.send_timeout(message.clone(), self.budget).await {
                Ok(()) => {
                    delivered += 1;
                    self.stats.fanout_delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(SendTimeoutError::Timeout(_)) => {
                    dropped += 1;
                    self.stats.dropped_timeout.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "Dropping {} from {} for subscriber {}: not accepted within {:?}",
                        typ, message.dpid, index, self.budget
                    );
                }
                Err(SendTimeoutError::Closed(_)) => {
                    dropped += 1;
                    self.stats.dropped_closed.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "Dropping {} from {} for subscriber {}: receiver closed",
                        typ, message.dpid, index
                    );
                }
            }
        }

        Delivery::Fanout { delivered, dropped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ofp_wire::{DatapathId, Message, MessageType};
    use std::time::Instant;

    fn packet_in(xid: u32) -> SwitchMessage {
        SwitchMessage::new(
            DatapathId(1),
            Message::new(MessageType::PacketIn, xid, Bytes::from_static(b"frame")),
        )
    }

    #[tokio::test]
    async fn test_reply_consumed_once_then_fans_out() {
        let mut subs = Subscriptions::new();
        let mut barrier_rx = subs.subscribe(MessageType::BarrierReply, 4);
        let router = MessageRouter::new(subs, Duration::from_millis(100));
        let pending = PendingRequests::new();

        let waiter = pending.register(0x1234).unwrap();
        let reply = SwitchMessage::new(
            DatapathId(1),
            Message::new(MessageType::BarrierReply, 0x1234, Bytes::new()),
        );

        assert_eq!(
            router.route(&pending, reply.clone()).await,
            Delivery::Reply { delivered: true }
        );
        assert_eq!(waiter.await.unwrap(), reply);
        assert!(pending.is_empty());

        assert_eq!(
            router.route(&pending, reply.clone()).await,
            Delivery::Fanout {
                delivered: 1,
                dropped: 0
            }
        );
        assert_eq!(barrier_rx.recv().await.unwrap(), reply);
        assert_eq!(router.stats().replies, 1);
        assert_eq!(router.stats().fanout_delivered, 1);
    }

    #[tokio::test]
    async fn test_reply_to_dropped_waiter_is_counted() {
        let router = MessageRouter::new(Subscriptions::new(), Duration::from_millis(100));
        let pending = PendingRequests::new();
        // Keep the entry but close the receiver
        let waiter = pending.register(5).unwrap();
        drop(waiter);

        assert_eq!(
            router.route(&pending, packet_in(5)).await,
            Delivery::Reply { delivered: false }
        );
        assert!(pending.is_empty());
        assert_eq!(router.stats().orphaned_replies, 1);
    }

    #[tokio::test]
    async fn test_stuck_subscriber_costs_one_budget_per_message() {
        let budget = Duration::from_millis(10);
        let mut subs = Subscriptions::new();
        // Never drained
        let _stuck = subs.subscribe(MessageType::PacketIn, 1);
        let mut healthy = subs.subscribe(MessageType::PacketIn, 64);
        let router = MessageRouter::new(subs, budget);
        let pending = PendingRequests::new();

        let started = Instant::now();
        for xid in 0..50 {
            router.route(&pending, packet_in(xid)).await;
        }
        let elapsed = started.elapsed();

        // First message fills the stuck channel, the other 49 each wait once
        assert!(elapsed >= budget * 49);
        assert!(elapsed < budget * 50 + Duration::from_secs(2));

        let stats = router.stats();
        assert_eq!(stats.dropped_timeout, 49);
        assert_eq!(stats.fanout_delivered, 51);

        let mut received = 0;
        while healthy.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 50);
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_a_drop() {
        let mut subs = Subscriptions::new();
        drop(subs.subscribe(MessageType::PacketIn, 1));
        let router = MessageRouter::new(subs, Duration::from_millis(100));

        let outcome = router.route(&PendingRequests::new(), packet_in(1)).await;
        assert_eq!(
            outcome,
            Delivery::Fanout {
                delivered: 0,
                dropped: 1
            }
        );
        assert_eq!(router.stats().dropped_closed, 1);
        assert_eq!(router.stats().dropped(), 1);
    }

    #[tokio::test]
    async fn test_unrouted_message() {
        let router = MessageRouter::new(Subscriptions::new(), Duration::from_millis(100));
        let outcome = router.route(&PendingRequests::new(), packet_in(1)).await;
        assert_eq!(outcome, Delivery::Unrouted);
        assert_eq!(router.stats().unrouted, 1);
    }
}

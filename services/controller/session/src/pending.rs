//! Outstanding request table for reply correlation.

use crate::error::SessionError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ofp_wire::SwitchMessage;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;
use tracing::trace;

/// Receives the single reply matching a request's transaction id
pub type ReplyWaiter = oneshot::Receiver<SwitchMessage>;

/// Table size below which abandoned waiters are left in place
const PRUNE_FLOOR: usize = 64;

/// Transaction id -> one-shot waiter.
///
/// Written by callers registering requests and by the receiver pipeline
/// consuming replies; `take` removes atomically so an entry is consumed at
/// most once.
#[derive(Debug)]
pub struct PendingRequests {
    waiters: DashMap<u32, oneshot::Sender<SwitchMessage>>,
    prune_at: AtomicUsize,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self {
            waiters: DashMap::new(),
            prune_at: AtomicUsize::new(PRUNE_FLOOR),
        }
    }
}

impl PendingRequests {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `xid`.
    ///
    /// Fails if a waiter whose receiver is still alive already holds the id;
    /// an abandoned entry for the same id is replaced. Other abandoned
    /// entries are swept once the table doubles past its last swept size.
    pub fn register(&self, xid: u32) -> Result<ReplyWaiter, SessionError> {
        if self.waiters.len() >= self.prune_at.load(Ordering::Relaxed) {
            let pruned = self.prune();
            let live = self.waiters.len();
            self.prune_at
                .store((live * 2).max(PRUNE_FLOOR), Ordering::Relaxed);
            trace!("Pruned {} abandoned waiters, {} live", pruned, live);
        }

        let (tx, rx) = oneshot::channel();
        match self.waiters.entry(xid) {
            Entry::Occupied(mut slot) if slot.get().is_closed() => {
                slot.insert(tx);
            }
            Entry::Occupied(_) => return Err(SessionError::DuplicateXid(xid)),
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }

        trace!("Registered waiter for xid {:#x}", xid);
        Ok(rx)
    }

    /// Remove and return the waiter for `xid`
    pub fn take(&self, xid: u32) -> Option<oneshot::Sender<SwitchMessage>> {
        self.waiters.remove(&xid).map(|(_, waiter)| waiter)
    }

    /// Drop the waiter for `xid`; true if one was registered
    pub fn cancel(&self, xid: u32) -> bool {
        self.take(xid).is_some()
    }

    /// Remove waiters whose caller dropped the receiver, returning the count
    pub fn prune(&self) -> usize {
        let before = self.waiters.len();
        self.waiters.retain(|_, waiter| !waiter.is_closed());
        before.saturating_sub(self.waiters.len())
    }

    /// Drop every waiter; their receivers observe a closed channel
    pub fn clear(&self) {
        self.waiters.clear();
    }

    /// Whether `xid` has a registered waiter
    pub fn contains(&self, xid: u32) -> bool {
        self.waiters.contains_key(&xid)
    }

    /// Number of registered waiters
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

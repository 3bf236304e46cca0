//! Per-switch session state.
//!
//! A [`SwitchSession`] outlives individual connections: reconnecting
//! replaces the pipeline bound to it but keeps the identity, the port and
//! link tables, the pending request table and the outbound queue. Only an
//! explicit disconnect through the [`crate::Network`] ends it.

use crate::error::SessionError;
use crate::link::Link;
use crate::pending::{PendingRequests, ReplyWaiter};
use crate::pipeline::{Outbound, OutboundQueue, Pipeline, PipelineContext};
use crate::router::MessageRouter;
use crate::transport::Connection;
use ofp_wire::{DatapathId, Message, PhyPort};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, trace};

/// A switch known to the controller
#[derive(Debug)]
pub struct SwitchSession {
    dpid: DatapathId,
    outbound: mpsc::Sender<Message>,
    queue: OutboundQueue,
    ports: RwLock<HashMap<u16, PhyPort>>,
    links: RwLock<HashMap<DatapathId, Link>>,
    pending: Arc<PendingRequests>,
    router: Arc<MessageRouter>,
    pipeline: Mutex<Option<Pipeline>>,
    generation: AtomicU64,
    closed: AtomicBool,
}

impl SwitchSession {
    pub(crate) fn new(
        dpid: DatapathId,
        ports: Vec<PhyPort>,
        queue_depth: usize,
        router: Arc<MessageRouter>,
    ) -> Self {
        let (outbound, queue) = mpsc::channel(queue_depth.max(1));
        let ports = ports.into_iter().map(|p| (p.port_no, p)).collect();

        Self {
            dpid,
            outbound,
            queue: Arc::new(Mutex::new(Outbound::new(queue))),
            ports: RwLock::new(ports),
            links: RwLock::new(HashMap::new()),
            pending: Arc::new(PendingRequests::new()),
            router,
            pipeline: Mutex::new(None),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Bind a freshly negotiated connection.
    ///
    /// The previous pipeline, if any, is fully stopped before the new one
    /// starts, so at no point do two senders share the outbound queue. A
    /// closed session hands the connection back untouched.
    pub(crate) async fn attach(&self, conn: Connection) -> Result<(), Connection> {
        let mut pipeline = self.pipeline.lock().await;
        if self.is_closed() {
            return Err(conn);
        }

        if let Some(old) = pipeline.take() {
            info!(
                "Replacing connection {} of switch {} (generation {})",
                old.peer(),
                self.dpid,
                old.generation()
            );
            old.shutdown().await;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *pipeline = Some(Pipeline::spawn(
            PipelineContext {
                dpid: self.dpid,
                generation,
                queue: self.queue.clone(),
                pending: self.pending.clone(),
                router: self.router.clone(),
            },
            conn,
        ));
        Ok(())
    }

    /// Stop the pipeline, reject further sends and drop pending waiters
    pub(crate) async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(pipeline) = self.pipeline.lock().await.take() {
            pipeline.shutdown().await;
        }

        let discarded = self.queue.lock().await.close();

        let waiters = self.pending.len();
        self.pending.clear();

        debug!(
            "Closed switch {}: {} queued messages discarded, {} waiters dropped",
            self.dpid, discarded, waiters
        );
    }

    /// Whether the session was removed from the registry
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Datapath id of this switch
    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }

    /// Number of connections attached so far (1 after the first handshake)
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a live pipeline is bound to this session
    pub async fn is_connected(&self) -> bool {
        self.pipeline
            .lock()
            .await
            .as_ref()
            .is_some_and(Pipeline::is_running)
    }

    /// Enqueue a message for the sender pipeline.
    ///
    /// Waits for queue capacity; messages from one session are written in
    /// the order they were accepted here. While the switch is between
    /// connections the message stays queued for the next one.
    pub async fn send(&self, message: Message) -> Result<(), SessionError> {
        let xid = message.xid();
        self.outbound
            .send(message)
            .await
            .map_err(|_| SessionError::Closed(self.dpid))?;
        trace!("Queued xid {:#x} for switch {}", xid, self.dpid);
        Ok(())
    }

    /// Send a request and return a waiter for the reply with the same xid.
    ///
    /// The waiter is registered before the request is queued. The caller
    /// decides how long to wait; dropping the waiter abandons the request.
    pub async fn send_and_receive(&self, request: Message) -> Result<ReplyWaiter, SessionError> {
        let xid = request.xid();
        let waiter = self.pending.register(xid)?;

        if let Err(e) = self.send(request).await {
            self.pending.cancel(xid);
            return Err(e);
        }
        Ok(waiter)
    }

    /// Copy of the port table, ordered by port number
    pub async fn ports(&self) -> Vec<PhyPort> {
        let ports = self.ports.read().await;
        let mut copy: Vec<PhyPort> = ports.values().cloned().collect();
        copy.sort_by_key(|p| p.port_no);
        copy
    }

    /// Copy of one port
    pub async fn port(&self, port_no: u16) -> Option<PhyPort> {
        self.ports.read().await.get(&port_no).cloned()
    }

    /// Insert or replace a port, returning the previous descriptor
    pub async fn set_port(&self, port: PhyPort) -> Option<PhyPort> {
        self.ports.write().await.insert(port.port_no, port)
    }

    /// Remove a port
    pub async fn remove_port(&self, port_no: u16) -> Option<PhyPort> {
        self.ports.write().await.remove(&port_no)
    }

    /// Copy of the link table, ordered by peer
    pub async fn links(&self) -> Vec<Link> {
        let links = self.links.read().await;
        let mut copy: Vec<(DatapathId, Link)> =
            links.iter().map(|(peer, link)| (*peer, link.clone())).collect();
        copy.sort_by_key(|(peer, _)| *peer);
        copy.into_iter().map(|(_, link)| link).collect()
    }

    /// Copy of the link to `peer`
    pub async fn link(&self, peer: DatapathId) -> Option<Link> {
        self.links.read().await.get(&peer).cloned()
    }

    /// Insert or replace the link to `peer`
    pub async fn set_link(&self, peer: DatapathId, link: Link) -> Option<Link> {
        self.links.write().await.insert(peer, link)
    }

    /// Remove the link to `peer`
    pub async fn remove_link(&self, peer: DatapathId) -> Option<Link> {
        self.links.write().await.remove(&peer)
    }

    /// Number of requests waiting for a reply
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }
}

//! Sender and receiver tasks bound to one connection.
//!
//! Each attached connection gets exactly one sender task (the only writer on
//! the connection) and one receiver task (the only reader). Both share a stop
//! signal: either task ending for any reason raises it, which ends the other.
//! The sender shuts down the write half on exit so the peer observes the
//! close.

use crate::pending::PendingRequests;
use crate::router::MessageRouter;
use crate::stream::{write_message, MessageStream};
use crate::transport::{BoxedWriter, Connection};
use ofp_wire::{DatapathId, Message, SwitchMessage};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Outbound queue receiver, kept by the session across reconnects
pub(crate) type OutboundQueue = Arc<Mutex<Outbound>>;

/// Receiving side of a session's outbound queue.
///
/// A message taken off the channel whose write was interrupted by a stop is
/// parked in `unsent` and written first by the next pipeline.
#[derive(Debug)]
pub(crate) struct Outbound {
    rx: mpsc::Receiver<Message>,
    unsent: Option<Message>,
}

impl Outbound {
    pub(crate) fn new(rx: mpsc::Receiver<Message>) -> Self {
        Self { rx, unsent: None }
    }

    /// Next message to write; cancel safe
    async fn next(&mut self) -> Option<Message> {
        match self.unsent.take() {
            Some(message) => Some(message),
            None => self.rx.recv().await,
        }
    }

    /// Reject further sends and discard everything queued, returning the count
    pub(crate) fn close(&mut self) -> usize {
        self.rx.close();
        let mut discarded = usize::from(self.unsent.take().is_some());
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

/// Shared state a pipeline needs from its session
pub(crate) struct PipelineContext {
    pub(crate) dpid: DatapathId,
    pub(crate) generation: u64,
    pub(crate) queue: OutboundQueue,
    pub(crate) pending: Arc<PendingRequests>,
    pub(crate) router: Arc<MessageRouter>,
}

/// Running sender/receiver pair
#[derive(Debug)]
pub(crate) struct Pipeline {
    generation: u64,
    peer: String,
    stop: Arc<watch::Sender<bool>>,
    sender: JoinHandle<()>,
    receiver: JoinHandle<()>,
}

impl Pipeline {
    /// Take ownership of `conn` and start both tasks
    pub(crate) fn spawn(ctx: PipelineContext, conn: Connection) -> Self {
        let (peer, stream, writer) = conn.into_parts();
        let (stop_tx, _) = watch::channel(false);
        let stop = Arc::new(stop_tx);

        // Subscribe before spawning so an early stop is never missed
        let sender_stop = stop.subscribe();
        let receiver_stop = stop.subscribe();

        let sender = tokio::spawn(run_sender(
            ctx.dpid,
            ctx.generation,
            writer,
            ctx.queue,
            stop.clone(),
            sender_stop,
        ));
        let receiver = tokio::spawn(run_receiver(
            ctx.dpid,
            ctx.generation,
            stream,
            ctx.pending,
            ctx.router,
            stop.clone(),
            receiver_stop,
        ));

        debug!(
            "Started pipeline {} for switch {} on {}",
            ctx.generation, ctx.dpid, peer
        );

        Self {
            generation: ctx.generation,
            peer,
            stop,
            sender,
            receiver,
        }
    }

    /// Connection generation this pipeline serves
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Peer label of the connection
    pub(crate) fn peer(&self) -> &str {
        &self.peer
    }

    /// Neither task has stopped yet
    pub(crate) fn is_running(&self) -> bool {
        !*self.stop.borrow()
    }

    /// Raise the stop signal and wait until both tasks have exited
    pub(crate) async fn shutdown(self) {
        self.stop.send_replace(true);

        if let Err(e) = self.sender.await {
            error!("Sender task for {} panicked: {}", self.peer, e);
        }
        if let Err(e) = self.receiver.await {
            error!("Receiver task for {} panicked: {}", self.peer, e);
        }

        trace!("Pipeline {} on {} stopped", self.generation, self.peer);
    }
}

async fn run_sender(
    dpid: DatapathId,
    generation: u64,
    mut writer: BoxedWriter,
    queue: OutboundQueue,
    stop: Arc<watch::Sender<bool>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut written = 0u64;

    let mut queue = tokio::select! {
        _ = stop_rx.changed() => None,
        guard = queue.lock() => Some(guard),
    };

    if let Some(queue) = queue.as_mut() {
        loop {
            let next = tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                next = queue.next() => next,
            };
            let Some(message) = next else {
                debug!("Outbound queue for switch {} closed", dpid);
                break;
            };

            // A stalled peer must not block shutdown
            let result = tokio::select! {
                biased;
                _ = stop_rx.changed() => None,
                result = write_message(&mut writer, &message) => Some(result),
            };

            match result {
                Some(Ok(())) => written += 1,
                Some(Err(e)) => {
                    warn!(
                        "Write to switch {} failed (generation {}): {}",
                        dpid, generation, e
                    );
                    queue.unsent = Some(message);
                    break;
                }
                None => {
                    queue.unsent = Some(message);
                    break;
                }
            }
        }
    }
    drop(queue);

    stop.send_replace(true);
    if let Err(e) = writer.shutdown().await {
        trace!("Shutdown of write half for switch {} failed: {}", dpid, e);
    }
    debug!(
        "Sender for switch {} (generation {}) exited after {} messages",
        dpid, generation, written
    );
}

async fn run_receiver(
    dpid: DatapathId,
    generation: u64,
    mut stream: MessageStream,
    pending: Arc<PendingRequests>,
    router: Arc<MessageRouter>,
    stop: Arc<watch::Sender<bool>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            next = stream.next_message() => next,
        };

        match next {
            Ok(Some(message)) => {
                // Fan-out may wait on slow subscribers; a stop ends it early
                let routed = tokio::select! {
                    biased;
                    _ = stop_rx.changed() => false,
                    _ = router.route(&pending, SwitchMessage::new(dpid, message)) => true,
                };
                if !routed {
                    debug!(
                        "Routing for switch {} interrupted by stop (generation {})",
                        dpid, generation
                    );
                    break;
                }
            }
            Ok(None) => {
                info!("Switch {} closed the connection (generation {})", dpid, generation);
                break;
            }
            Err(e) => {
                warn!(
                    "Read from switch {} failed (generation {}): {}",
                    dpid, generation, e
                );
                break;
            }
        }
    }

    stop.send_replace(true);
    debug!(
        "Receiver for switch {} (generation {}) exited after {} messages",
        dpid,
        generation,
        stream.decoded()
    );
}

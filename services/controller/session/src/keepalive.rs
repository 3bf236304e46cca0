//! Echo keepalive responder.
//!
//! Switches probe the controller with ECHO_REQUEST and drop the connection
//! if no ECHO_REPLY comes back. Subscribe a channel to
//! [`MessageType::EchoRequest`](ofp_wire::MessageType::EchoRequest) and run
//! this task on its receiver.

use crate::network::Network;
use ofp_wire::{Message, SwitchMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Answer every echo request with an echo reply carrying the same xid and data.
///
/// Each reply is given the network's delivery budget to be queued, so a
/// switch that is between connections cannot hold up replies to others.
/// Returns when the subscription channel closes.
pub async fn run_echo_responder(network: Arc<Network>, mut requests: mpsc::Receiver<SwitchMessage>) {
    let budget = network.config().delivery_budget;
    let mut answered = 0u64;

    while let Some(SwitchMessage { dpid, message }) = requests.recv().await {
        let Some(switch) = network.switch(dpid).await else {
            debug!("Echo request from unknown switch {} ignored", dpid);
            continue;
        };

        let reply = Message::echo_reply(&message);
        match tokio::time::timeout(budget, switch.send(reply)).await {
            Ok(Ok(())) => {
                answered += 1;
                trace!("Answered echo {:#x} from {}", message.xid(), dpid);
            }
            Ok(Err(e)) => debug!("Echo reply to {} not sent: {}", dpid, e),
            Err(_) => debug!("Echo reply to {} not queued within {:?}", dpid, budget),
        }
    }

    info!("Echo responder stopped after {} replies", answered);
}

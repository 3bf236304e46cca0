//! Keeps session port tables in line with PORT_STATUS notifications.

use crate::network::Network;
use ofp_wire::{PortReason, PortStatus, SwitchMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Apply every PORT_STATUS received on `updates` to the owning session.
///
/// Add and Modify replace the descriptor, Delete removes it. Malformed
/// bodies are logged and skipped. Returns when the channel closes.
pub async fn run_port_status_updater(
    network: Arc<Network>,
    mut updates: mpsc::Receiver<SwitchMessage>,
) {
    while let Some(SwitchMessage { dpid, message }) = updates.recv().await {
        let status = match PortStatus::from_message(&message) {
            Ok(status) => status,
            Err(e) => {
                warn!("Malformed PORT_STATUS from {}: {}", dpid, e);
                continue;
            }
        };

        let Some(switch) = network.switch(dpid).await else {
            debug!("PORT_STATUS from unknown switch {} ignored", dpid);
            continue;
        };

        let port_no = status.desc.port_no;
        match status.reason {
            PortReason::Add | PortReason::Modify => {
                let up = status.desc.is_up();
                switch.set_port(status.desc).await;
                info!(
                    "Port {} on {} {:?} ({})",
                    port_no,
                    dpid,
                    status.reason,
                    if up { "up" } else { "down" }
                );
            }
            PortReason::Delete => {
                if switch.remove_port(port_no).await.is_none() {
                    debug!("Delete of unknown port {} on {}", port_no, dpid);
                }
                info!("Port {} on {} deleted", port_no, dpid);
            }
        }
    }
}

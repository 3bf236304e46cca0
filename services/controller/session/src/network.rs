//! Registry of connected switches and session establishment.
//!
//! The [`Network`] is the controller's single piece of process-wide mutable
//! state. It is created once, shared by `Arc`, and handed to everything that
//! needs to look up a switch; there is no global instance.

use crate::config::NetworkConfig;
use crate::error::HandshakeError;
use crate::handshake::negotiate;
use crate::router::{MessageRouter, RouterStatsSnapshot};
use crate::subscriptions::Subscriptions;
use crate::switch::SwitchSession;
use crate::transport::Connection;
use futures::future::join_all;
use ofp_wire::{DatapathId, FeaturesReply};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// All switch sessions known to the controller, keyed by datapath id
#[derive(Debug)]
pub struct Network {
    config: NetworkConfig,
    router: Arc<MessageRouter>,
    switches: RwLock<HashMap<DatapathId, Arc<SwitchSession>>>,
}

impl Network {
    /// Create an empty registry.
    ///
    /// `subscriptions` is fixed from here on; every session routes through
    /// the same table.
    pub fn new(config: NetworkConfig, subscriptions: Subscriptions) -> Self {
        let router = Arc::new(MessageRouter::new(subscriptions, config.delivery_budget));
        Self {
            config,
            router,
            switches: RwLock::new(HashMap::new()),
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Routing counters across all sessions
    pub fn router_stats(&self) -> RouterStatsSnapshot {
        self.router.stats()
    }

    /// Establish a session on `conn`, logging instead of returning failures.
    ///
    /// Intended for accept loops that do not care why a connection failed.
    pub async fn accept(&self, conn: Connection) -> Option<Arc<SwitchSession>> {
        let peer = conn.peer().to_string();
        match self.establish(conn).await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Handshake with {} failed: {}", peer, e);
                None
            }
        }
    }

    /// Run the handshake on `conn` and register or recover the session.
    ///
    /// On failure the connection is closed and the registry is untouched.
    pub async fn establish(&self, mut conn: Connection) -> Result<Arc<SwitchSession>, HandshakeError> {
        let timeout = self.config.handshake_timeout;
        let outcome = tokio::time::timeout(timeout, negotiate(&mut conn)).await;

        let features = match outcome {
            Ok(Ok(features)) => features,
            Ok(Err(e)) => {
                conn.close().await;
                return Err(e);
            }
            Err(_) => {
                conn.close().await;
                return Err(HandshakeError::Timeout(timeout));
            }
        };

        Ok(self.register_or_recover(features, conn).await)
    }

    /// Bind a negotiated connection to the session for its datapath id.
    ///
    /// A known id keeps its session object and state; only the connection
    /// and pipelines are replaced. An unknown id gets a new session whose
    /// port table comes from `features`. The registry lock only covers the
    /// lookup; stopping the old pipeline happens outside it.
    pub async fn register_or_recover(
        &self,
        features: FeaturesReply,
        mut conn: Connection,
    ) -> Arc<SwitchSession> {
        let dpid = features.datapath_id;
        let peer = conn.peer().to_string();

        loop {
            let (session, created) = {
                let mut switches = self.switches.write().await;
                match switches.get(&dpid) {
                    Some(existing) => (existing.clone(), false),
                    None => {
                        let session = Arc::new(SwitchSession::new(
                            dpid,
                            features.ports.clone(),
                            self.config.outbound_queue_depth,
                            self.router.clone(),
                        ));
                        switches.insert(dpid, session.clone());
                        (session, true)
                    }
                }
            };

            match session.attach(conn).await {
                Ok(()) if created => {
                    info!(
                        "Switch {} connected from {} with {} ports, {} tables, {} buffers",
                        dpid,
                        peer,
                        features.ports.len(),
                        features.n_tables,
                        features.n_buffers
                    );
                    return session;
                }
                Ok(()) => {
                    info!(
                        "Switch {} recovered on {} (generation {})",
                        dpid,
                        peer,
                        session.generation()
                    );
                    return session;
                }
                Err(returned) => {
                    // Disconnected meanwhile; the id is free again
                    debug!("Switch {} was disconnected during attach, registering anew", dpid);
                    conn = returned;
                }
            }
        }
    }

    /// Look up a switch
    pub async fn switch(&self, dpid: DatapathId) -> Option<Arc<SwitchSession>> {
        self.switches.read().await.get(&dpid).cloned()
    }

    /// Snapshot of every registered switch, ordered by datapath id
    pub async fn switches(&self) -> Vec<Arc<SwitchSession>> {
        let switches = self.switches.read().await;
        let mut all: Vec<Arc<SwitchSession>> = switches.values().cloned().collect();
        all.sort_by_key(|s| s.dpid());
        all
    }

    /// Number of registered switches
    pub async fn len(&self) -> usize {
        self.switches.read().await.len()
    }

    /// True when no switch is registered
    pub async fn is_empty(&self) -> bool {
        self.switches.read().await.is_empty()
    }

    /// Remove a switch and close its connection.
    ///
    /// Returns false if the switch was not registered.
    pub async fn disconnect(&self, dpid: DatapathId) -> bool {
        let removed = self.switches.write().await.remove(&dpid);

        match removed {
            Some(session) => {
                session.close().await;
                info!("Switch {} disconnected", dpid);
                true
            }
            None => {
                debug!("Disconnect of unknown switch {} ignored", dpid);
                false
            }
        }
    }

    /// Disconnect every switch
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<SwitchSession>> = {
            let mut switches = self.switches.write().await;
            switches.drain().map(|(_, session)| session).collect()
        };

        let count = drained.len();
        join_all(drained.iter().map(|session| session.close())).await;
        info!("Network shut down, {} switches disconnected", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::handshake::HandshakeState;
    use crate::link::Link;
    use crate::testing::{connect, connect_over, features, BreakableWrites};
    use bytes::Bytes;
    use ofp_wire::{Message, MessageType};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    async fn wait_disconnected(session: &SwitchSession) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while session.is_connected().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    fn network() -> Network {
        Network::new(NetworkConfig::default(), Subscriptions::new())
    }

    #[tokio::test]
    async fn test_first_handshake_registers_session() {
        let network = network();
        let dpid: DatapathId = "AA:BB:CC:DD:EE:01".parse().unwrap();

        let (session, _switch) = connect(&network, features(dpid.as_u64(), &[1, 2, 3])).await;

        assert_eq!(session.dpid(), dpid);
        assert_eq!(session.generation(), 1);
        assert!(session.is_connected().await);
        assert_eq!(session.ports().await.len(), 3);
        assert!(Arc::ptr_eq(&network.switch(dpid).await.unwrap(), &session));
        assert_eq!(network.len().await, 1);
    }

    #[tokio::test]
    async fn test_reconnect_recovers_existing_session() {
        let network = network();
        let dpid: DatapathId = "AA:BB:CC:DD:EE:01".parse().unwrap();

        let (first, mut old_switch) = connect(&network, features(dpid.as_u64(), &[1, 2])).await;
        let peer = DatapathId(0x02);
        first.set_link(peer, Link::new(dpid, 1, peer, 1)).await;

        // Second handshake advertises different ports; the table is kept
        let (second, mut new_switch) = connect(&network, features(dpid.as_u64(), &[9])).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(network.len().await, 1);
        assert_eq!(second.generation(), 2);
        assert!(second.link(peer).await.is_some());
        assert_eq!(second.ports().await.len(), 2);

        // The old connection was closed by the controller
        let old = tokio::time::timeout(Duration::from_secs(1), old_switch.recv())
            .await
            .unwrap();
        assert!(matches!(old, Ok(None)));

        // Traffic flows on the new one
        second.send(Message::hello(77)).await.unwrap();
        let message = new_switch.recv().await.unwrap().unwrap();
        assert_eq!(message.xid(), 77);
    }

    #[tokio::test]
    async fn test_disconnect_removes_and_closes() {
        let network = network();
        let (session, mut switch) = connect(&network, features(7, &[1])).await;
        let dpid = session.dpid();

        assert!(network.disconnect(dpid).await);
        assert!(network.switch(dpid).await.is_none());
        assert!(network.is_empty().await);

        let closed = tokio::time::timeout(Duration::from_secs(1), switch.recv())
            .await
            .unwrap();
        assert!(matches!(closed, Ok(None)));
        assert!(matches!(
            session.send(Message::hello(1)).await,
            Err(SessionError::Closed(_))
        ));

        // Idempotent
        assert!(!network.disconnect(dpid).await);
    }

    #[tokio::test]
    async fn test_failed_handshake_registers_nothing() {
        let network = network();
        let (ctl, sw) = tokio::io::duplex(1024);
        let mut switch = Connection::new(sw, "switch");

        let script = async {
            switch.recv().await.unwrap();
            switch.send(&Message::features_request(1)).await.unwrap();
        };
        let (result, ()) = tokio::join!(network.establish(Connection::new(ctl, "ctl")), script);

        assert!(matches!(
            result,
            Err(HandshakeError::Wire {
                state: HandshakeState::HelloSent,
                ..
            })
        ));
        assert!(network.is_empty().await);
        // Controller side was closed
        assert!(matches!(switch.recv().await, Ok(None)));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let config = NetworkConfig {
            handshake_timeout: Duration::from_millis(50),
            ..NetworkConfig::default()
        };
        let network = Network::new(config, Subscriptions::new());
        let (ctl, _sw) = tokio::io::duplex(1024);

        let result = network.establish(Connection::new(ctl, "ctl")).await;
        assert!(matches!(result, Err(HandshakeError::Timeout(_))));
        assert!(network.is_empty().await);
    }

    #[tokio::test]
    async fn test_peer_close_keeps_session_registered() {
        let network = network();
        let (session, switch) = connect(&network, features(5, &[])).await;

        drop(switch);
        wait_disconnected(&session).await;

        assert!(network.switch(session.dpid()).await.is_some());
    }

    #[tokio::test]
    async fn test_write_failure_closes_connection_keeps_session() {
        let network = network();
        let broken = Arc::new(AtomicBool::new(false));
        let (ctl, sw) = tokio::io::duplex(64 * 1024);
        let ctl = BreakableWrites {
            inner: ctl,
            broken: broken.clone(),
        };
        let (session, mut switch) =
            connect_over(&network, features(6, &[]), Connection::new(ctl, "ctl"), sw).await;

        broken.store(true, Ordering::SeqCst);
        session.send(Message::hello(31)).await.unwrap();
        wait_disconnected(&session).await;

        // Write half shut down, read side torn down with it
        let closed = tokio::time::timeout(Duration::from_secs(1), switch.recv())
            .await
            .unwrap();
        assert!(matches!(closed, Ok(None)));
        assert!(Arc::ptr_eq(&network.switch(session.dpid()).await.unwrap(), &session));

        // The failed message goes out on the next connection
        let (recovered, mut new_switch) = connect(&network, features(6, &[])).await;
        assert!(Arc::ptr_eq(&recovered, &session));
        assert_eq!(new_switch.recv().await.unwrap().unwrap().xid(), 31);
    }

    #[tokio::test]
    async fn test_reconnect_keeps_pending_and_queued() {
        let network = network();
        let (session, old_switch) = connect(&network, features(8, &[])).await;

        drop(old_switch);
        wait_disconnected(&session).await;

        // Queued while no connection is bound
        let request = Message::echo_request(0x55, Bytes::from_static(b"later"));
        let waiter = session.send_and_receive(request).await.unwrap();
        assert_eq!(session.pending_requests(), 1);

        let (recovered, mut new_switch) = connect(&network, features(8, &[])).await;
        assert!(Arc::ptr_eq(&recovered, &session));

        let seen = new_switch.recv().await.unwrap().unwrap();
        assert_eq!(seen.typ(), MessageType::EchoRequest);
        assert_eq!(seen.xid(), 0x55);
        new_switch.send(&Message::echo_reply(&seen)).await.unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&reply.message.payload[..], b"later");
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_reconnect_does_not_block_other_lookups() {
        let mut subs = Subscriptions::new();
        let _never_drained = subs.subscribe(MessageType::PacketIn, 1);
        let config = NetworkConfig {
            delivery_budget: Duration::from_secs(30),
            ..NetworkConfig::default()
        };
        let network = Arc::new(Network::new(config, subs));

        let (_other, _other_switch) = connect(&network, features(2, &[])).await;
        let (_session, mut switch) = connect(&network, features(1, &[])).await;

        // Park switch 1's receiver in fan-out
        for xid in [1, 2] {
            switch
                .send(&Message::new(MessageType::PacketIn, xid, Bytes::new()))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let reconnect = {
            let network = network.clone();
            tokio::spawn(async move { connect(&network, features(1, &[])).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let other = tokio::time::timeout(Duration::from_millis(200), network.switch(DatapathId(2)))
            .await
            .unwrap();
        assert!(other.is_some());

        let (recovered, _new_switch) = tokio::time::timeout(Duration::from_secs(5), reconnect)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recovered.generation(), 2);
    }

    #[tokio::test]
    async fn test_connect_after_disconnect_registers_fresh_session() {
        let network = network();
        let (first, _old_switch) = connect(&network, features(9, &[1])).await;

        assert!(network.disconnect(first.dpid()).await);
        assert!(first.is_closed());

        let (second, _new_switch) = connect(&network, features(9, &[1, 2])).await;
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.generation(), 1);
        assert_eq!(second.ports().await.len(), 2);
        assert!(!first.is_connected().await);
    }

    #[tokio::test]
    async fn test_switches_snapshot_and_shutdown() {
        let network = network();
        let (_b, _sw_b) = connect(&network, features(2, &[])).await;
        let (_a, _sw_a) = connect(&network, features(1, &[])).await;

        let all = network.switches().await;
        assert_eq!(
            all.iter().map(|s| s.dpid()).collect::<Vec<_>>(),
            vec![DatapathId(1), DatapathId(2)]
        );

        network.shutdown().await;
        assert!(network.is_empty().await);
        // The snapshot still holds the sessions, now closed
        for session in all {
            assert!(!session.is_connected().await);
        }
    }
}

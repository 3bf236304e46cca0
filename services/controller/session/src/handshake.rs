//! HELLO / FEATURES handshake.
//!
//! Runs immediately after a connection is accepted and before anything is
//! registered. The exchange is strictly sequential:
//!
//! ```text
//! Connecting --HELLO-->        HelloSent
//! HelloSent  <--HELLO--        HelloReceived
//! HelloReceived --FEATURES_REQUEST--> FeaturesRequested
//! FeaturesRequested <--FEATURES_REPLY-- Established
//! ```
//!
//! Any error leaves the state where it happened and is reported through
//! [`HandshakeError`]; the caller closes the connection.

use crate::error::HandshakeError;
use crate::transport::Connection;
use ofp_wire::{next_xid, FeaturesReply, Message, MessageType, OFP_VERSION};
use std::fmt;
use tracing::{debug, trace};

/// Handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing exchanged yet
    Connecting,
    /// Our HELLO is on the wire
    HelloSent,
    /// Peer HELLO accepted
    HelloReceived,
    /// FEATURES_REQUEST is on the wire
    FeaturesRequested,
    /// FEATURES_REPLY parsed
    Established,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::Connecting => "connecting",
            HandshakeState::HelloSent => "hello-sent",
            HandshakeState::HelloReceived => "hello-received",
            HandshakeState::FeaturesRequested => "features-requested",
            HandshakeState::Established => "established",
        };
        f.write_str(name)
    }
}

/// Perform the handshake on a fresh connection and return the switch features
pub async fn negotiate(conn: &mut Connection) -> Result<FeaturesReply, HandshakeError> {
    let mut state = HandshakeState::Connecting;

    conn.send(&Message::hello(next_xid()))
        .await
        .map_err(|e| HandshakeError::at(state, e))?;
    state = transition(conn, state, HandshakeState::HelloSent);

    let hello = expect(conn, state, MessageType::Hello).await?;
    if hello.header.version == 0 {
        return Err(HandshakeError::Version(hello.header.version));
    }
    if hello.header.version != OFP_VERSION {
        debug!(
            "Peer {} offered version {:#x}, continuing with {:#x}",
            conn.peer(),
            hello.header.version,
            OFP_VERSION
        );
    }
    state = transition(conn, state, HandshakeState::HelloReceived);

    let request = Message::features_request(next_xid());
    conn.send(&request)
        .await
        .map_err(|e| HandshakeError::at(state, e))?;
    state = transition(conn, state, HandshakeState::FeaturesRequested);

    let reply = expect(conn, state, MessageType::FeaturesReply).await?;
    if reply.xid() != request.xid() {
        trace!(
            "FEATURES_REPLY xid {:#x} does not match request {:#x}",
            reply.xid(),
            request.xid()
        );
    }
    let features =
        FeaturesReply::from_message(&reply).map_err(|source| HandshakeError::Wire { state, source })?;
    transition(conn, state, HandshakeState::Established);

    Ok(features)
}

fn transition(conn: &Connection, from: HandshakeState, to: HandshakeState) -> HandshakeState {
    trace!("Handshake with {}: {} -> {}", conn.peer(), from, to);
    to
}

async fn expect(
    conn: &mut Connection,
    state: HandshakeState,
    typ: MessageType,
) -> Result<Message, HandshakeError> {
    match conn.recv().await {
        Ok(Some(message)) => {
            message
                .expect_type(typ)
                .map_err(|source| HandshakeError::Wire { state, source })?;
            Ok(message)
        }
        Ok(None) => Err(HandshakeError::Closed(state)),
        Err(e) => Err(HandshakeError::at(state, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{features, switch_handshake};

    #[tokio::test]
    async fn test_negotiate_returns_features() {
        let (ctl, sw) = tokio::io::duplex(64 * 1024);
        let mut conn = Connection::new(ctl, "test");
        let mut switch = Connection::new(sw, "switch");

        let expected = features(0xaabb_ccdd_ee01, &[1, 2]);
        let (result, ()) = tokio::join!(
            negotiate(&mut conn),
            switch_handshake(&mut switch, expected.clone())
        );

        let negotiated = result.unwrap();
        assert_eq!(negotiated.datapath_id, expected.datapath_id);
        assert_eq!(negotiated.ports.len(), 2);
    }

    #[tokio::test]
    async fn test_negotiate_rejects_unexpected_message() {
        let (ctl, sw) = tokio::io::duplex(64 * 1024);
        let mut conn = Connection::new(ctl, "test");
        let mut switch = Connection::new(sw, "switch");

        let script = async {
            switch.recv().await.unwrap();
            switch
                .send(&Message::echo_request(1, bytes::Bytes::new()))
                .await
                .unwrap();
        };
        let (result, ()) = tokio::join!(negotiate(&mut conn), script);

        assert!(matches!(
            result,
            Err(HandshakeError::Wire {
                state: HandshakeState::HelloSent,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_negotiate_rejects_version_zero() {
        let (ctl, sw) = tokio::io::duplex(64 * 1024);
        let mut conn = Connection::new(ctl, "test");
        let mut switch = Connection::new(sw, "switch");

        let script = async {
            switch.recv().await.unwrap();
            let mut hello = Message::hello(1);
            hello.header.version = 0;
            switch.send(&hello).await.unwrap();
        };
        let (result, ()) = tokio::join!(negotiate(&mut conn), script);

        assert!(matches!(result, Err(HandshakeError::Version(0))));
    }

    #[tokio::test]
    async fn test_negotiate_peer_closes() {
        let (ctl, sw) = tokio::io::duplex(64 * 1024);
        let mut conn = Connection::new(ctl, "test");
        drop(sw);

        let result = negotiate(&mut conn).await;
        assert!(matches!(
            result,
            Err(HandshakeError::Io { .. }) | Err(HandshakeError::Closed(_))
        ));
    }
}

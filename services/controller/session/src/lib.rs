//! Switch registry, connection lifecycle and message routing for an
//! OpenFlow 1.0 controller.
//!
//! This crate owns everything between an accepted byte stream and the
//! application: the HELLO/FEATURES handshake, the per-switch session with
//! its sender and receiver tasks, reply correlation by transaction id and
//! fan-out of everything else to type subscribers.
//!
//! ## Features
//!
//! - **Registry**: one [`SwitchSession`] per datapath id, recovered in place
//!   on reconnect
//! - **Pipelines**: a single writer and a single reader per connection
//! - **Correlation**: [`SwitchSession::send_and_receive`] returns a one-shot
//!   waiter for the matching reply
//! - **Bounded fan-out**: slow subscribers cost at most the delivery budget
//!   per message and every drop is counted
//! - **Helpers**: echo keepalive responder and port status updater
//!
//! ## Example
//!
//! ```rust,no_run
//! use ofp_session::{
//!     listen_tcp, run_echo_responder, Connection, Network, NetworkConfig, Subscriptions,
//! };
//! use ofp_wire::MessageType;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut subs = Subscriptions::new();
//! let echo = subs.subscribe(MessageType::EchoRequest, 64);
//! let mut packets = subs.subscribe(MessageType::PacketIn, 1024);
//!
//! let network = Arc::new(Network::new(NetworkConfig::default(), subs));
//! tokio::spawn(run_echo_responder(network.clone(), echo));
//!
//! let listener = listen_tcp("0.0.0.0:6633".parse()?).await?;
//! let acceptor = network.clone();
//! tokio::spawn(async move {
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let network = acceptor.clone();
//!         tokio::spawn(async move {
//!             if let Ok(conn) = Connection::from_tcp(stream) {
//!                 network.accept(conn).await;
//!             }
//!         });
//!     }
//! });
//!
//! while let Some(packet) = packets.recv().await {
//!     println!("PACKET_IN from {} ({} bytes)", packet.dpid, packet.message.payload.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod handshake;
pub mod keepalive;
pub mod link;
pub mod network;
pub mod pending;
mod pipeline;
pub mod port_status;
pub mod router;
pub mod stream;
pub mod subscriptions;
pub mod switch;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types
pub use config::{NetworkConfig, DEFAULT_DELIVERY_BUDGET, DEFAULT_HANDSHAKE_TIMEOUT};
pub use error::{HandshakeError, SessionError};
pub use handshake::{negotiate, HandshakeState};
pub use keepalive::run_echo_responder;
pub use link::Link;
pub use network::Network;
pub use pending::{PendingRequests, ReplyWaiter};
pub use port_status::run_port_status_updater;
pub use router::{Delivery, MessageRouter, RouterStats, RouterStatsSnapshot};
pub use stream::MessageStream;
pub use subscriptions::Subscriptions;
pub use switch::SwitchSession;
pub use transport::{listen_tcp, Connection};

//! Switch-side helpers for tests.

use crate::network::Network;
use crate::switch::SwitchSession;
use crate::transport::Connection;
use ofp_wire::{Capabilities, DatapathId, FeaturesReply, Message, MessageType, PhyPort, OFP_VERSION};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

pub(crate) fn phy_port(port_no: u16) -> PhyPort {
    let mut hw_addr = [0x02, 0, 0, 0, 0, 0];
    hw_addr[4..].copy_from_slice(&port_no.to_be_bytes());
    PhyPort::new(port_no, hw_addr, format!("eth{}", port_no))
}

pub(crate) fn features(dpid: u64, ports: &[u16]) -> FeaturesReply {
    FeaturesReply {
        xid: 0,
        version: OFP_VERSION,
        datapath_id: DatapathId(dpid),
        n_buffers: 256,
        n_tables: 1,
        capabilities: Capabilities::FLOW_STATS | Capabilities::PORT_STATS,
        actions: 0xfff,
        ports: ports.iter().map(|&n| phy_port(n)).collect(),
    }
}

/// Play the switch side of the handshake
pub(crate) async fn switch_handshake(switch: &mut Connection, mut features: FeaturesReply) {
    let hello = switch.recv().await.unwrap().unwrap();
    assert_eq!(hello.typ(), MessageType::Hello);
    switch.send(&Message::hello(hello.xid())).await.unwrap();

    let request = switch.recv().await.unwrap().unwrap();
    assert_eq!(request.typ(), MessageType::FeaturesRequest);
    features.xid = request.xid();
    switch.send(&features.to_message()).await.unwrap();
}

/// Connect a simulated switch and return its session and the switch end
pub(crate) async fn connect(
    network: &Network,
    features: FeaturesReply,
) -> (Arc<SwitchSession>, Connection) {
    let (ctl, sw) = tokio::io::duplex(64 * 1024);
    connect_over(network, features, Connection::new(ctl, "ctl"), sw).await
}

/// Like [`connect`], over a caller-supplied controller end
pub(crate) async fn connect_over(
    network: &Network,
    features: FeaturesReply,
    ctl: Connection,
    sw: DuplexStream,
) -> (Arc<SwitchSession>, Connection) {
    let mut switch = Connection::new(sw, format!("switch-{}", features.datapath_id));

    let (session, ()) = tokio::join!(
        network.establish(ctl),
        switch_handshake(&mut switch, features)
    );
    (session.unwrap(), switch)
}

/// Pipe end whose writes fail once `broken` is set; reads and shutdown
/// still pass through
pub(crate) struct BreakableWrites {
    pub(crate) inner: DuplexStream,
    pub(crate) broken: Arc<AtomicBool>,
}

impl AsyncRead for BreakableWrites {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for BreakableWrites {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.broken.load(Ordering::SeqCst) {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken")));
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

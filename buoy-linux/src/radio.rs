//! Simulated radio link: UDP multicast on the LAN. Every buoy joins one group, so every
//! frame reaches every buoy, the sender included. Buoys filter frames themselves.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use buoy_core::{BuoyNode, OutboundFrame, FRAME_LEN};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct Radio {
    socket: UdpSocket,
    group: SocketAddr,
}

impl Radio {
    /// Join `group` on `port`. Address reuse lets several buoys share one host.
    pub fn open(group: Ipv4Addr, port: u16) -> std::io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())?;
        socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
        socket.set_multicast_loop_v4(true)?;
        socket.set_multicast_ttl_v4(1)?;
        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket.into())?;
        Ok(Self {
            socket,
            group: SocketAddrV4::new(group, port).into(),
        })
    }

    /// Fire-and-forget send. Failures are logged, never retried.
    pub async fn send(&self, out: &OutboundFrame) {
        debug!(
            kind = %out.frame.kind,
            destination = %out.destination,
            payload = %out.frame.payload,
            "sending"
        );
        match self.socket.send_to(&out.bytes, self.group).await {
            Ok(n) if n == out.bytes.len() => {}
            Ok(n) => warn!(sent = n, expected = out.bytes.len(), "error sending: short write"),
            Err(e) => warn!(error = %e, kind = %out.frame.kind, "error sending"),
        }
    }
}

/// Feed every received frame to the node, one at a time, and send its replies.
pub async fn recv_loop(radio: Arc<Radio>, node: Arc<Mutex<BuoyNode>>) -> std::io::Result<()> {
    // Room for one frame plus slack, so oversized datagrams still decode their first frame.
    let mut buf = vec![0u8; FRAME_LEN * 2];
    loop {
        let (n, from) = radio.socket.recv_from(&mut buf).await?;
        let (reply, before, after) = {
            let mut node = node.lock().await;
            let before = node.info();
            let reply = node.handle_inbound(&buf[..n]);
            (reply, before, node.info())
        };
        if before != after {
            info!(%from, "\n{}", after);
        }
        if let Some(out) = reply {
            radio.send(&out).await;
        }
    }
}

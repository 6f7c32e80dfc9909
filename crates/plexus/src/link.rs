//! One peer connection joined to a bridge and a dispatcher.

use std::sync::Arc;

use plexus_dispatch::Dispatcher;
use plexus_transport::{Connection, ConnectionId, TransportError};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::bridge::{Datagram, NetBridge};
use crate::PlexusError;

/// What a link moved before it ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sent: u64,
    pub received: u64,
    /// Received datagrams that were not game messages.
    pub other: u64,
}

/// Detaches a peer when its link ends, including when the link task is
/// aborted or panics.
struct PeerGuard {
    bridge: Arc<NetBridge>,
    id: ConnectionId,
}

impl Drop for PeerGuard {
    fn drop(&mut self) {
        self.bridge.detach_peer(self.id);
    }
}

/// Attaches `conn` to `bridge` and runs the link until the peer closes or
/// the bridge detaches it.
pub async fn run_link<C>(
    conn: C,
    bridge: Arc<NetBridge>,
    dispatcher: Arc<Dispatcher>,
) -> Result<LinkStats, PlexusError>
where
    C: Connection<Error = TransportError>,
{
    let outbound = bridge.attach_peer(conn.id());
    drive_link(conn, outbound, bridge, dispatcher).await
}

/// Runs a link whose peer is already attached.
///
/// Outbound datagrams go to `conn`; inbound ones go through
/// [`NetBridge::handle_datagram`]. The peer is detached on the way out,
/// whatever the reason.
pub(crate) async fn drive_link<C>(
    conn: C,
    mut outbound: mpsc::UnboundedReceiver<Datagram>,
    bridge: Arc<NetBridge>,
    dispatcher: Arc<Dispatcher>,
) -> Result<LinkStats, PlexusError>
where
    C: Connection<Error = TransportError>,
{
    let id = conn.id();
    let _guard = PeerGuard {
        bridge: bridge.clone(),
        id,
    };
    let mut stats = LinkStats::default();

    let result = loop {
        tokio::select! {
            datagram = outbound.recv() => {
                let Some(datagram) = datagram else {
                    debug!(%id, "detached from bridge");
                    break Ok(());
                };
                let sent = if datagram.unreliable {
                    conn.send_unreliable(&datagram.bytes).await
                } else {
                    conn.send(&datagram.bytes).await
                };
                if let Err(e) = sent {
                    break Err(e);
                }
                stats.sent += 1;
            }
            inbound = conn.recv() => match inbound {
                Ok(Some(bytes)) => {
                    stats.received += 1;
                    if let Some(other) = bridge.handle_datagram(&bytes, &dispatcher) {
                        stats.other += 1;
                        debug!(%id, class = %other.class_index(), kind = other.body.name(), "unhandled net message");
                    }
                }
                Ok(None) => {
                    debug!(%id, "peer closed");
                    break Ok(());
                }
                Err(e) => break Err(e),
            },
        }
    };

    info!(%id, sent = stats.sent, received = stats.received, "link ended");
    result.map(|()| stats).map_err(PlexusError::from)
}

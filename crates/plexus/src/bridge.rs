//! The network side of a dispatcher.
//!
//! Outbound: the dispatcher hands every message that should cross the
//! network to [`NetBridge::propagate`], which encodes it once and fans the
//! bytes out to every attached peer. Inbound: a link feeds each received
//! datagram to [`NetBridge::handle_datagram`], which rebuilds game messages
//! and sends them into the dispatcher as remote messages.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use plexus_dispatch::{
    BroadcastFlags, Dispatcher, MessageRef, NetPropagator, ReceiverDirectory,
};
use plexus_transport::ConnectionId;
use plexus_wire::{NetBody, NetFlags, NetHeader, NetMessage, NetMessageRegistry, UnifiedTime};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::codec::{self, PayloadCodecs};
use crate::config::BridgeConfig;
use crate::PlexusError;

/// One poked net message on its way to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub bytes: Arc<[u8]>,
    pub unreliable: bool,
}

/// Flags a message picks up when it arrives from a peer.
///
/// `NET_START_CASCADE` makes the dispatcher keep the remote bits instead of
/// inheriting from whatever message happens to be delivering.
pub const REMOTE_FLAGS: BroadcastFlags = BroadcastFlags::NET_NON_LOCAL
    .union(BroadcastFlags::NET_SENT)
    .union(BroadcastFlags::NET_CREATED_REMOTELY)
    .union(BroadcastFlags::NET_START_CASCADE);

pub struct NetBridge {
    config: BridgeConfig,
    registry: NetMessageRegistry,
    codecs: PayloadCodecs,
    directory: Arc<ReceiverDirectory>,
    peers: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Datagram>>>,
}

impl NetBridge {
    pub fn new(config: BridgeConfig, codecs: PayloadCodecs, directory: Arc<ReceiverDirectory>) -> Self {
        Self {
            config,
            registry: NetMessageRegistry::with_builtin(),
            codecs,
            directory,
            peers: RwLock::new(HashMap::new()),
        }
    }

    pub fn directory(&self) -> &Arc<ReceiverDirectory> {
        &self.directory
    }

    pub fn registry(&self) -> &NetMessageRegistry {
        &self.registry
    }

    /// Starts fanning out to `id`. The returned channel yields everything
    /// propagated from now on. Attaching an id twice replaces the old
    /// channel, which then closes.
    pub fn attach_peer(&self, id: ConnectionId) -> mpsc::UnboundedReceiver<Datagram> {
        let (tx, rx) = mpsc::unbounded_channel();
        let previous = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        if previous.is_some() {
            warn!(%id, "peer attached twice, replacing");
        } else {
            debug!(%id, "peer attached");
        }
        rx
    }

    pub fn detach_peer(&self, id: ConnectionId) -> bool {
        let removed = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            debug!(%id, "peer detached");
        }
        removed
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The net message `msg` goes out as.
    pub fn build_net_message(&self, msg: &MessageRef) -> Result<NetMessage, PlexusError> {
        let body = codec::encode_message(msg, &self.codecs)?;

        let mut header = if self.config.send_version {
            NetHeader::versioned()
        } else {
            NetHeader::default()
        };
        if self.config.stamp_time_sent {
            header.time_sent = Some(UnifiedTime::now());
        }
        header.player_id = self.config.player_id;

        let flags = msg.flags();
        if !flags.contains(BroadcastFlags::NET_SEND_UNRELIABLE) {
            header.insert_flags(NetFlags::NEEDS_RELIABLE_SEND);
        }
        if flags.contains(BroadcastFlags::SEND_TO_ALL_PLAYERS) {
            header.insert_flags(NetFlags::ROUTE_TO_ALL_PLAYERS);
        }
        if matches!(body, NetBody::GameMessageDirected(_)) {
            header.insert_flags(NetFlags::HAS_GAME_MSG_RECEIVERS);
        }
        Ok(NetMessage::with_header(header, body))
    }

    /// Handles one datagram from a peer.
    ///
    /// Game messages are sent into `dispatcher` and `None` is returned.
    /// Any other registered class is returned for the caller to handle.
    /// Bytes that do not parse are logged and dropped.
    pub fn handle_datagram(&self, bytes: &[u8], dispatcher: &Dispatcher) -> Option<NetMessage> {
        let net = self.registry.create_and_read(bytes)?;
        match &net.body {
            NetBody::GameMessage(_) | NetBody::GameMessageDirected(_) => {}
            _ => return Some(net),
        }

        let msg = match codec::decode_message(&net.body, &self.codecs, &self.directory) {
            // Net-only on the sending side still means "deliver here". A remote
            // message never goes back out, or forced messages would bounce.
            Ok(msg) => {
                msg.remove_flags(BroadcastFlags::NET_PROPAGATE);
                msg.flagged(REMOTE_FLAGS | BroadcastFlags::LOCAL_PROPAGATE)
            }
            Err(e) => {
                debug!(class = %net.class_index(), error = %e, "dropping undecodable game message");
                return None;
            }
        };
        trace!(class = %msg.class(), player = ?net.header.player_id, "remote message");
        dispatcher.send(msg, false);
        None
    }
}

impl NetPropagator for NetBridge {
    fn propagate(&self, msg: &MessageRef) -> bool {
        let net = match self.build_net_message(msg) {
            Ok(net) => net,
            Err(e) => {
                debug!(class = %msg.class(), error = %e, "cannot propagate");
                return false;
            }
        };
        let bytes: Arc<[u8]> = match net.encode() {
            Ok(bytes) => bytes.into(),
            Err(e) => {
                warn!(class = %msg.class(), error = %e, "cannot poke net message");
                return false;
            }
        };
        let datagram = Datagram {
            bytes,
            unreliable: msg.has_flags(BroadcastFlags::NET_SEND_UNRELIABLE),
        };

        let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        for (id, tx) in peers.iter() {
            if tx.send(datagram.clone()).is_ok() {
                delivered += 1;
            } else {
                trace!(%id, "peer link gone");
            }
        }
        trace!(class = %msg.class(), peers = delivered, len = datagram.bytes.len(), "propagated");
        delivered > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_dispatch::{ManualClock, Message, MsgClass};

    const PING: MsgClass = MsgClass(0x0600);

    fn bridge(config: BridgeConfig) -> NetBridge {
        let mut codecs = PayloadCodecs::new();
        codecs.register_signal(PING);
        NetBridge::new(config, codecs, Arc::new(ReceiverDirectory::new()))
    }

    #[test]
    fn test_remote_flags() {
        assert!(REMOTE_FLAGS.contains(BroadcastFlags::NET_NON_LOCAL | BroadcastFlags::NET_SENT));
        assert!(REMOTE_FLAGS.contains(BroadcastFlags::NET_START_CASCADE));
    }

    #[test]
    fn test_attach_detach() {
        let b = bridge(BridgeConfig::default());
        let _rx = b.attach_peer(ConnectionId::new(1));
        assert_eq!(b.peer_count(), 1);
        assert!(b.detach_peer(ConnectionId::new(1)));
        assert!(!b.detach_peer(ConnectionId::new(1)));
        assert_eq!(b.peer_count(), 0);
    }

    #[test]
    fn test_header_follows_config_and_flags() {
        let b = bridge(BridgeConfig {
            player_id: Some(42),
            stamp_time_sent: false,
            send_version: true,
        });
        let msg: MessageRef = Message::signal(PING)
            .broadcast()
            .flagged(BroadcastFlags::NET_SEND_UNRELIABLE | BroadcastFlags::SEND_TO_ALL_PLAYERS)
            .into();
        let net = b.build_net_message(&msg).unwrap();
        assert_eq!(net.header.player_id, Some(42));
        assert!(net.header.time_sent.is_none());
        assert!(net.header.version.is_some());
        let flags = net.header.flags();
        assert!(flags.contains(NetFlags::ROUTE_TO_ALL_PLAYERS));
        assert!(!flags.contains(NetFlags::NEEDS_RELIABLE_SEND));
    }

    #[test]
    fn test_propagate_without_peers_is_false() {
        let b = bridge(BridgeConfig::default());
        let msg: MessageRef = Message::signal(PING).broadcast().into();
        assert!(!b.propagate(&msg));
    }

    #[test]
    fn test_propagate_fans_out_and_skips_dead_links() {
        let b = bridge(BridgeConfig::default());
        let mut a = b.attach_peer(ConnectionId::new(1));
        let mut c = b.attach_peer(ConnectionId::new(2));
        drop(b.attach_peer(ConnectionId::new(3)));

        let msg: MessageRef = Message::signal(PING).broadcast().into();
        assert!(b.propagate(&msg));
        let got_a = a.try_recv().unwrap();
        let got_c = c.try_recv().unwrap();
        assert_eq!(got_a, got_c);
        assert!(!got_a.unreliable);
    }

    #[test]
    fn test_unknown_payload_is_not_propagated() {
        let b = bridge(BridgeConfig::default());
        let _rx = b.attach_peer(ConnectionId::new(1));
        let msg: MessageRef = Message::signal(MsgClass(0x0777)).broadcast().into();
        assert!(!b.propagate(&msg));
    }

    #[test]
    fn test_non_game_datagram_is_returned() {
        let b = bridge(BridgeConfig::default());
        let dispatcher = Dispatcher::new(Arc::new(ManualClock::new(0.0)));
        let bytes = NetMessage::new(NetBody::MembersListReq(plexus_wire::MembersListReq))
            .encode()
            .unwrap();
        let net = b.handle_datagram(&bytes, &dispatcher).unwrap();
        assert_eq!(net.body.name(), "MembersListReq");
    }

    #[test]
    fn test_garbage_datagram_is_dropped() {
        let b = bridge(BridgeConfig::default());
        let dispatcher = Dispatcher::new(Arc::new(ManualClock::new(0.0)));
        assert!(b.handle_datagram(&[0xde, 0xad], &dispatcher).is_none());
        assert!(b.handle_datagram(&[], &dispatcher).is_none());
    }
}

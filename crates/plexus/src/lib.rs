//! # Plexus
//!
//! An in-process message dispatch bus joined to a versioned binary wire
//! protocol.
//!
//! Application code sends [`Message`]s into a [`Dispatcher`]. Receivers
//! registered for a class get them in breadth-first order; messages
//! flagged for the network are encoded by the [`NetBridge`] and sent to
//! every linked peer, where they re-enter that peer's dispatcher as
//! remote messages. A [`ClockPump`] moves logical time and releases
//! deferred messages.
//!
//! ```text
//!            ┌────────────┐  propagate  ┌───────────┐  datagram  ┌──────┐
//! send ────→ │ Dispatcher │ ──────────→ │ NetBridge │ ─────────→ │ link │ ──→ peer
//!            └────────────┘ ←────────── └───────────┘ ←───────── └──────┘
//!                  ↑        handle_datagram
//!             TimeAdvanced
//!                  │
//!             ClockPump
//! ```
//!
//! The sub-crates stand alone: `plexus-wire` (codec), `plexus-dispatch`
//! (bus), `plexus-clock` (time) and `plexus-transport` (connections).

pub mod bridge;
pub mod codec;
pub mod config;
mod error;
pub mod link;
pub mod logging;
mod node;

pub use bridge::{Datagram, NetBridge, REMOTE_FLAGS};
pub use codec::{decode_message, encode_message, PayloadCodecs, WirePayload};
pub use config::{BridgeConfig, ConfigError, PlexusConfig};
pub use error::PlexusError;
pub use link::{run_link, LinkStats};
pub use logging::init_tracing;
pub use node::PlexusNode;

pub use plexus_clock as clock;
pub use plexus_dispatch as dispatch;
pub use plexus_transport as transport;
pub use plexus_wire as wire;

pub use plexus_clock::ClockPump;
pub use plexus_dispatch::{Dispatcher, Message};

/// The names most applications need.
pub mod prelude {
    pub use crate::{
        init_tracing, BridgeConfig, LinkStats, NetBridge, PayloadCodecs, PlexusConfig,
        PlexusError, PlexusNode, WirePayload,
    };
    pub use plexus_clock::{ClockConfig, ClockPolicy, ClockPump, LogicalClock, TickInfo};
    pub use plexus_dispatch::{
        BroadcastFlags, Clock, DispatchConfig, Dispatcher, Message, MessageKind, MessageRef,
        MsgClass, Receiver, ReceiverDirectory, ReceiverHandle, ReceiverKey, TimeAdvanced,
    };
    pub use plexus_transport::{Connection, LoopbackConnection, Transport};
    pub use plexus_wire::{WireError, WireReader};
}

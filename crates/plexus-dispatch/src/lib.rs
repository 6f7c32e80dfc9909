//! In-process message dispatch bus for Plexus.
//!
//! A [`Dispatcher`] takes [`Message`]s and decides, per message, whether
//! to deliver it to local [`Receiver`]s now, hold it until a future logical
//! time, hand it to the network through a [`NetPropagator`], or any
//! combination of those.
//!
//! - **Messages** ([`Message`], [`MessageRef`], [`BroadcastFlags`]):
//!   class tag, routing flags, addressing and a type-erased payload.
//! - **Receivers** ([`Receiver`], [`ReceiverHandle`], [`ReceiverDirectory`]):
//!   handlers, held weakly.
//! - **Time** ([`Clock`], [`TimeAdvanced`]): deferred messages are released
//!   by a "time advanced" message, never by wall time alone.
//! - **Network rules** ([`inherit_net_msg_flags`], [`should_net_propagate`]):
//!   which messages cross the network and how a cascade of responses
//!   avoids being sent twice.
//!
//! ```text
//! app ──send──→ Dispatcher ──→ live queue ──→ Receiver::msg_receive
//!                   │    └───→ deferred queue (until TimeAdvanced)
//!                   └──→ NetPropagator (network bridge)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod cascade;
mod clock;
mod config;
mod directory;
mod dispatcher;
mod filter;
mod message;
mod propagation;
mod queue;
mod receiver;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use cascade::inherit_net_msg_flags;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DispatchConfig;
pub use directory::ReceiverDirectory;
pub use dispatcher::{Dispatcher, ShutdownReport};
pub use message::{BroadcastFlags, Message, MessageKind, MessageRef, MsgClass, TimeAdvanced};
pub use propagation::{should_deliver_locally, should_net_propagate, NetPropagator};
pub use receiver::{Receiver, ReceiverHandle, ReceiverKey};

//! The message value that travels through the dispatcher.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cascade::inherit_net_msg_flags;
use crate::{ReceiverHandle, ReceiverKey};

// ---------------------------------------------------------------------------
// MsgClass
// ---------------------------------------------------------------------------

/// Identifies what a message *is*. Receivers register per class, and the
/// network codec looks payload codecs up by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgClass(pub u16);

impl MsgClass {
    /// The clock's "time advanced" signal. See [`TimeAdvanced`].
    pub const TIME_ADVANCED: Self = Self(0x0001);
}

impl fmt::Display for MsgClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// BroadcastFlags
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// Routing flags on a [`Message`].
    ///
    /// The `NET_*` bits drive the network propagation decision and are
    /// carried from a message to the messages its handlers send (see
    /// [`crate::inherit_net_msg_flags`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct BroadcastFlags: u32 {
        /// Deliver to every receiver registered for the message class.
        const BCAST_BY_EXACT_TYPE = 0x0000_0008;
        /// Forget the class's registrations after this broadcast.
        const CLEAR_AFTER_BCAST = 0x0000_0020;
        /// Send to remote peers as well.
        const NET_PROPAGATE = 0x0000_0040;
        /// Already sent over the network once.
        const NET_SENT = 0x0000_0080;
        /// Propagate even if already sent.
        const NET_FORCE = 0x0000_0200;
        /// Arrived from a remote peer.
        const NET_NON_LOCAL = 0x0000_0400;
        /// Deliver to local receivers.
        const LOCAL_PROPAGATE = 0x0000_0800;
        /// Outcome differs per peer, so it always propagates.
        const NET_NON_DETERMINISTIC = 0x0000_1000;
        /// Starts a new causal chain; do not inherit from the parent.
        const NET_START_CASCADE = 0x0000_2000;
        const NET_SEND_UNRELIABLE = 0x0000_8000;
        const SEND_TO_ALL_PLAYERS = 0x0001_0000;
        const NET_CREATED_REMOTELY = 0x0002_0000;
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A payload type with a fixed message class.
pub trait MessageKind: Any + Send + Sync {
    const CLASS: MsgClass;
}

/// Emitted by a clock whenever logical time moves forward. Sending it
/// releases deferred messages scheduled at or before `seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeAdvanced {
    /// Logical time after the advance.
    pub seconds: f64,
    /// How far time moved.
    pub delta: f64,
}

impl MessageKind for TimeAdvanced {
    const CLASS: MsgClass = MsgClass::TIME_ADVANCED;
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Shared handle to a message. A message lives until the last queue entry
/// or handler holding it lets go.
pub type MessageRef = Arc<Message>;

/// A message: a class tag, routing flags, addressing, an optional schedule
/// time and a type-erased payload.
///
/// Flags and the schedule time are atomics so the dispatcher can update
/// them on a shared [`MessageRef`].
pub struct Message {
    class: MsgClass,
    flags: AtomicU32,
    /// `f64` bits; `0.0` means "now".
    timestamp: AtomicU64,
    sender: Option<ReceiverKey>,
    receivers: Vec<ReceiverHandle>,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Message {
    /// A message carrying `payload`, with the class taken from its type.
    pub fn new<T: MessageKind>(payload: T) -> Self {
        Self::from_parts(T::CLASS, Arc::new(payload))
    }

    /// A message with no payload, identified by class alone.
    pub fn signal(class: MsgClass) -> Self {
        Self::from_parts(class, Arc::new(()))
    }

    /// A message from an already type-erased payload.
    pub fn from_parts(class: MsgClass, payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            class,
            flags: AtomicU32::new(BroadcastFlags::LOCAL_PROPAGATE.bits()),
            timestamp: AtomicU64::new(0f64.to_bits()),
            sender: None,
            receivers: Vec::new(),
            payload,
        }
    }

    /// The "time advanced" signal for the deferred queue.
    pub fn time_advanced(seconds: f64, delta: f64) -> Self {
        Self::new(TimeAdvanced { seconds, delta }).broadcast()
    }

    // --- builders ---

    /// Replaces all flags.
    pub fn with_flags(self, flags: BroadcastFlags) -> Self {
        self.set_flags(flags);
        self
    }

    /// Adds flags to the current set.
    pub fn flagged(self, flags: BroadcastFlags) -> Self {
        self.insert_flags(flags);
        self
    }

    /// Broadcast to everyone registered for this class.
    pub fn broadcast(self) -> Self {
        self.flagged(BroadcastFlags::BCAST_BY_EXACT_TYPE)
    }

    /// Adds an explicit receiver.
    pub fn to(mut self, receiver: ReceiverHandle) -> Self {
        self.receivers.push(receiver);
        self
    }

    pub fn sent_by(mut self, sender: ReceiverKey) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Schedules delivery for logical time `seconds`.
    pub fn at(self, seconds: f64) -> Self {
        self.set_timestamp(seconds);
        self
    }

    // --- accessors ---

    pub fn class(&self) -> MsgClass {
        self.class
    }

    pub fn sender(&self) -> Option<ReceiverKey> {
        self.sender
    }

    pub fn receivers(&self) -> &[ReceiverHandle] {
        &self.receivers
    }

    pub fn timestamp(&self) -> f64 {
        f64::from_bits(self.timestamp.load(Ordering::Acquire))
    }

    pub fn set_timestamp(&self, seconds: f64) {
        self.timestamp.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn flags(&self) -> BroadcastFlags {
        BroadcastFlags::from_bits_retain(self.flags.load(Ordering::Acquire))
    }

    pub fn has_flags(&self, flags: BroadcastFlags) -> bool {
        self.flags().contains(flags)
    }

    pub fn set_flags(&self, flags: BroadcastFlags) {
        self.flags.store(flags.bits(), Ordering::Release);
    }

    pub fn insert_flags(&self, flags: BroadcastFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn remove_flags(&self, flags: BroadcastFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// The payload, if it is a `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// The payload without a type, for codecs.
    pub fn payload_any(&self) -> &(dyn Any + Send + Sync) {
        self.payload.as_ref()
    }

    /// Takes the net-cascade flags from `parent`. See
    /// [`crate::inherit_net_msg_flags`].
    pub fn inherit_net_flags(&self, parent: Option<&Message>, start_cascade: bool) {
        let mut flags = self.flags();
        inherit_net_msg_flags(parent.map(Message::flags), &mut flags, start_cascade);
        self.set_flags(flags);
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("class", &self.class)
            .field("flags", &self.flags())
            .field("timestamp", &self.timestamp())
            .field("sender", &self.sender)
            .field("receivers", &self.receivers.len())
            .finish_non_exhaustive()
    }
}

//! Receivers and the weak handles the dispatcher keeps to them.

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::{Dispatcher, MessageRef};

/// Stable identity of a receiver, unique within a process. It is what
/// travels over the network when a message is addressed to a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiverKey(pub u32);

impl fmt::Display for ReceiverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Something that handles messages.
///
/// Handlers run on the dispatching thread. They may call
/// [`Dispatcher::send`] again; those messages are queued behind the
/// current batch rather than delivered immediately.
pub trait Receiver: Send + Sync {
    /// Handles one message. The return value reports whether the receiver
    /// cared about it; the dispatcher only logs it.
    fn msg_receive(&self, msg: &MessageRef, dispatcher: &Dispatcher) -> bool;

    /// Whether this receiver accepts messages that arrived from the
    /// network. Receivers that do not opt in never see `NET_NON_LOCAL`
    /// messages.
    fn is_net_synched(&self) -> bool {
        false
    }
}

/// A key plus a weak reference to the receiver.
///
/// The dispatcher never keeps receivers alive. A handle whose receiver
/// has been dropped simply fails to resolve and is skipped.
#[derive(Clone)]
pub struct ReceiverHandle {
    key: ReceiverKey,
    receiver: Weak<dyn Receiver>,
}

impl ReceiverHandle {
    pub fn new<R: Receiver + 'static>(key: ReceiverKey, receiver: &Arc<R>) -> Self {
        let receiver: Arc<dyn Receiver> = receiver.clone();
        Self::from_weak(key, Arc::downgrade(&receiver))
    }

    pub fn from_weak(key: ReceiverKey, receiver: Weak<dyn Receiver>) -> Self {
        Self { key, receiver }
    }

    pub fn key(&self) -> ReceiverKey {
        self.key
    }

    /// The receiver, if it is still alive.
    pub fn resolve(&self) -> Option<Arc<dyn Receiver>> {
        self.receiver.upgrade()
    }

    pub fn is_resolvable(&self) -> bool {
        self.receiver.strong_count() > 0
    }
}

impl fmt::Debug for ReceiverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverHandle")
            .field("key", &self.key)
            .field("alive", &self.is_resolvable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl Receiver for Nop {
        fn msg_receive(&self, _msg: &MessageRef, _dispatcher: &Dispatcher) -> bool {
            false
        }
    }

    #[test]
    fn test_handle_does_not_keep_receiver_alive() {
        let receiver = Arc::new(Nop);
        let handle = ReceiverHandle::new(ReceiverKey(1), &receiver);
        assert!(handle.resolve().is_some());

        drop(receiver);
        assert!(handle.resolve().is_none());
        assert!(!handle.is_resolvable());
        assert_eq!(handle.key(), ReceiverKey(1));
    }

    #[test]
    fn test_default_is_not_net_synched() {
        assert!(!Nop.is_net_synched());
    }
}

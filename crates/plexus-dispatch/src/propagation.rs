//! Whether a message goes to the network, locally, or both.

use crate::{BroadcastFlags, MessageRef};

/// The network side of the dispatcher. Installed with
/// [`crate::Dispatcher::set_propagator`].
pub trait NetPropagator: Send + Sync {
    /// Sends `msg` to remote peers. Returns false if nothing was sent.
    fn propagate(&self, msg: &MessageRef) -> bool;
}

/// A message goes to the network if it asks to and has not been sent
/// already, unless something forces a resend.
pub fn should_net_propagate(flags: BroadcastFlags) -> bool {
    if !flags.contains(BroadcastFlags::NET_PROPAGATE) {
        return false;
    }
    !flags.contains(BroadcastFlags::NET_SENT)
        || flags.intersects(
            BroadcastFlags::NET_FORCE
                | BroadcastFlags::NET_NON_DETERMINISTIC
                | BroadcastFlags::SEND_TO_ALL_PLAYERS,
        )
}

pub fn should_deliver_locally(flags: BroadcastFlags) -> bool {
    flags.contains(BroadcastFlags::LOCAL_PROPAGATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    type F = BroadcastFlags;

    #[test]
    fn test_net_propagate_required() {
        assert!(!should_net_propagate(F::NET_FORCE));
        assert!(should_net_propagate(F::NET_PROPAGATE));
    }

    #[test]
    fn test_sent_messages_are_not_resent() {
        assert!(!should_net_propagate(F::NET_PROPAGATE | F::NET_SENT));
    }

    #[test]
    fn test_overrides_resend() {
        for extra in [F::NET_FORCE, F::NET_NON_DETERMINISTIC, F::SEND_TO_ALL_PLAYERS] {
            assert!(should_net_propagate(F::NET_PROPAGATE | F::NET_SENT | extra));
        }
    }

    #[test]
    fn test_local_delivery_flag() {
        assert!(should_deliver_locally(F::LOCAL_PROPAGATE | F::NET_NON_LOCAL));
        assert!(!should_deliver_locally(F::NET_PROPAGATE));
    }
}

//! Net-cascade flag inheritance.
//!
//! When a handler sends a message in response to one it received, the
//! response belongs to the same causal chain. If the cause came from the
//! network (`NET_NON_LOCAL`) or was already sent (`NET_SENT`), every peer
//! runs the same handler and produces the same response, so the response
//! must not be sent again. Copying those two bits from parent to child is
//! what keeps a chain from echoing across the network.

use crate::BroadcastFlags;

const INHERITED: BroadcastFlags =
    BroadcastFlags::NET_SENT.union(BroadcastFlags::NET_NON_LOCAL);

/// Copies the cascade bits of `parent` onto `child`.
///
/// Unless `child` already has `NET_START_CASCADE`, its `NET_SENT` and
/// `NET_NON_LOCAL` are set or cleared to match `parent` (no parent means
/// both clear). Afterwards `NET_START_CASCADE` on the child is set to
/// `start_cascade`.
pub fn inherit_net_msg_flags(
    parent: Option<BroadcastFlags>,
    child: &mut BroadcastFlags,
    start_cascade: bool,
) {
    if !child.contains(BroadcastFlags::NET_START_CASCADE) {
        let from_parent = parent.unwrap_or_default() & INHERITED;
        child.remove(INHERITED);
        child.insert(from_parent);
    }
    child.set(BroadcastFlags::NET_START_CASCADE, start_cascade);
}

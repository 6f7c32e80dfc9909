//! Live and deferred message queues.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::{MessageRef, ReceiverHandle};

/// One live-queue entry: a message plus the receivers resolved for it at
/// send time.
pub(crate) struct MsgWrap {
    pub msg: MessageRef,
    pub receivers: Vec<ReceiverHandle>,
}

// ---------------------------------------------------------------------------
// DeferredQueue
// ---------------------------------------------------------------------------

struct Deferred {
    at: f64,
    seq: u64,
    msg: MessageRef,
}

// `BinaryHeap` is a max-heap, so the comparison is reversed: the earliest
// time, then the lowest sequence number, is the greatest element.
impl Ord for Deferred {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Deferred {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Deferred {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Deferred {}

/// Messages waiting for a future logical time, earliest first. Equal
/// times come out in the order they went in.
#[derive(Default)]
pub(crate) struct DeferredQueue {
    heap: BinaryHeap<Deferred>,
    next_seq: u64,
}

impl DeferredQueue {
    pub fn push(&mut self, at: f64, msg: MessageRef) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Deferred { at, seq, msg });
    }

    /// Pops the earliest message if it is due at or before `until`.
    pub fn pop_due(&mut self, until: f64) -> Option<MessageRef> {
        if self.heap.peek()?.at > until {
            return None;
        }
        self.heap.pop().map(|d| d.msg)
    }

    pub fn next_due(&self) -> Option<f64> {
        self.heap.peek().map(|d| d.at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Drops everything and returns how many messages were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.heap.len();
        self.heap.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{Message, MsgClass};

    fn msg(tag: u16) -> MessageRef {
        Arc::new(Message::signal(MsgClass(tag)))
    }

    #[test]
    fn test_pop_due_respects_time() {
        let mut q = DeferredQueue::default();
        q.push(2.0, msg(2));
        q.push(1.0, msg(1));
        assert_eq!(q.next_due(), Some(1.0));
        assert!(q.pop_due(0.5).is_none());
        assert_eq!(q.pop_due(1.0).map(|m| m.class()), Some(MsgClass(1)));
        assert!(q.pop_due(1.5).is_none());
        assert_eq!(q.pop_due(5.0).map(|m| m.class()), Some(MsgClass(2)));
        assert!(q.pop_due(f64::MAX).is_none());
    }

    #[test]
    fn test_equal_times_pop_in_send_order() {
        let mut q = DeferredQueue::default();
        for tag in 0..5 {
            q.push(3.0, msg(tag));
        }
        let order: Vec<u16> = std::iter::from_fn(|| q.pop_due(3.0))
            .map(|m| m.class().0)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_clear_reports_count() {
        let mut q = DeferredQueue::default();
        q.push(1.0, msg(1));
        q.push(2.0, msg(2));
        assert_eq!(q.clear(), 2);
        assert_eq!(q.len(), 0);
    }
}

//! Per-class receiver registrations.

use std::collections::HashMap;

use crate::{MsgClass, ReceiverHandle, ReceiverKey};

/// Class → insertion-ordered, key-unique list of receivers.
///
/// A class with no receivers has no entry at all.
#[derive(Debug, Default)]
pub(crate) struct TypeFilterTable {
    filters: HashMap<MsgClass, Vec<ReceiverHandle>>,
}

impl TypeFilterTable {
    /// Returns false if the key was already registered for `class`.
    pub fn register(&mut self, class: MsgClass, handle: ReceiverHandle) -> bool {
        let filter = self.filters.entry(class).or_default();
        if filter.iter().any(|h| h.key() == handle.key()) {
            return false;
        }
        filter.push(handle);
        true
    }

    /// Returns false if the key was not registered for `class`.
    pub fn unregister(&mut self, class: MsgClass, key: ReceiverKey) -> bool {
        let Some(filter) = self.filters.get_mut(&class) else {
            return false;
        };
        let before = filter.len();
        filter.retain(|h| h.key() != key);
        let removed = filter.len() != before;
        if filter.is_empty() {
            self.filters.remove(&class);
        }
        removed
    }

    /// Removes `key` from every class. Returns how many registrations went.
    pub fn unregister_all(&mut self, key: ReceiverKey) -> usize {
        let mut removed = 0;
        self.filters.retain(|_, filter| {
            let before = filter.len();
            filter.retain(|h| h.key() != key);
            removed += before - filter.len();
            !filter.is_empty()
        });
        removed
    }

    pub fn receivers(&self, class: MsgClass) -> Vec<ReceiverHandle> {
        self.filters.get(&class).cloned().unwrap_or_default()
    }

    /// Removes the whole filter for `class` and returns its receivers.
    pub fn take(&mut self, class: MsgClass) -> Vec<ReceiverHandle> {
        self.filters.remove(&class).unwrap_or_default()
    }

    pub fn contains_class(&self, class: MsgClass) -> bool {
        self.filters.contains_key(&class)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{Dispatcher, MessageRef, Receiver};

    struct Nop;

    impl Receiver for Nop {
        fn msg_receive(&self, _msg: &MessageRef, _d: &Dispatcher) -> bool {
            true
        }
    }

    const CLASS: MsgClass = MsgClass(0x10);

    fn keys(table: &TypeFilterTable) -> Vec<u32> {
        table.receivers(CLASS).iter().map(|h| h.key().0).collect()
    }

    #[test]
    fn test_register_keeps_insertion_order_and_dedups() {
        let r = Arc::new(Nop);
        let mut table = TypeFilterTable::default();
        assert!(table.register(CLASS, ReceiverHandle::new(ReceiverKey(3), &r)));
        assert!(table.register(CLASS, ReceiverHandle::new(ReceiverKey(1), &r)));
        assert!(!table.register(CLASS, ReceiverHandle::new(ReceiverKey(3), &r)));
        assert_eq!(keys(&table), vec![3, 1]);
    }

    #[test]
    fn test_last_unregister_removes_filter() {
        let r = Arc::new(Nop);
        let mut table = TypeFilterTable::default();
        table.register(CLASS, ReceiverHandle::new(ReceiverKey(1), &r));
        assert!(!table.unregister(CLASS, ReceiverKey(2)));
        assert!(table.unregister(CLASS, ReceiverKey(1)));
        assert!(!table.contains_class(CLASS));
        assert!(!table.unregister(CLASS, ReceiverKey(1)));
    }

    #[test]
    fn test_unregister_all_spans_classes() {
        let r = Arc::new(Nop);
        let mut table = TypeFilterTable::default();
        table.register(CLASS, ReceiverHandle::new(ReceiverKey(1), &r));
        table.register(MsgClass(0x11), ReceiverHandle::new(ReceiverKey(1), &r));
        table.register(MsgClass(0x11), ReceiverHandle::new(ReceiverKey(2), &r));
        assert_eq!(table.unregister_all(ReceiverKey(1)), 2);
        assert!(!table.contains_class(CLASS));
        assert_eq!(table.receivers(MsgClass(0x11)).len(), 1);
    }

    #[test]
    fn test_take_clears_class() {
        let r = Arc::new(Nop);
        let mut table = TypeFilterTable::default();
        table.register(CLASS, ReceiverHandle::new(ReceiverKey(1), &r));
        assert_eq!(table.take(CLASS).len(), 1);
        assert!(table.receivers(CLASS).is_empty());
    }
}

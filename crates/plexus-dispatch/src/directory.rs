//! Key → receiver lookup for messages that name receivers by key.
//!
//! A message that arrives over the network only carries [`ReceiverKey`]s.
//! The directory turns those back into handles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::{Receiver, ReceiverHandle, ReceiverKey};

#[derive(Default)]
pub struct ReceiverDirectory {
    entries: RwLock<HashMap<ReceiverKey, Weak<dyn Receiver>>>,
    next_key: AtomicU32,
}

impl ReceiverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `receiver` under `key`, replacing any earlier entry, and
    /// returns a handle to it.
    pub fn insert<R: Receiver + 'static>(&self, key: ReceiverKey, receiver: &Arc<R>) -> ReceiverHandle {
        let handle = ReceiverHandle::new(key, receiver);
        let strong: Arc<dyn Receiver> = receiver.clone();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::downgrade(&strong));
        self.next_key
            .fetch_max(key.0.saturating_add(1), Ordering::AcqRel);
        handle
    }

    /// Records `receiver` under a fresh key, above every key seen so far.
    pub fn register<R: Receiver + 'static>(&self, receiver: &Arc<R>) -> ReceiverHandle {
        let key = ReceiverKey(self.next_key.fetch_add(1, Ordering::AcqRel));
        self.insert(key, receiver)
    }

    pub fn remove(&self, key: ReceiverKey) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some()
    }

    /// The live receiver for `key`.
    pub fn resolve(&self, key: ReceiverKey) -> Option<Arc<dyn Receiver>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)?
            .upgrade()
    }

    /// A handle for `key`, if the key is known and its receiver alive.
    pub fn handle(&self, key: ReceiverKey) -> Option<ReceiverHandle> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let weak = entries.get(&key)?;
        (weak.strong_count() > 0).then(|| ReceiverHandle::from_weak(key, weak.clone()))
    }

    /// Drops entries whose receivers are gone. Returns how many.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, weak| weak.strong_count() > 0);
        let pruned = before - entries.len();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned dead receivers");
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

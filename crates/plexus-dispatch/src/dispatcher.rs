//! The dispatcher: routes messages to receivers, the network, or the
//! deferred queue.
//!
//! # Flow of a `send`
//!
//! ```text
//! send(msg)
//!   ├─ scheduled in the future? ──→ deferred queue (until TimeAdvanced)
//!   ├─ TimeAdvanced? ──→ release due deferred messages first
//!   ├─ resolve receivers (class filter or explicit list)
//!   ├─ inherit cascade flags, maybe hand to the NetPropagator
//!   ├─ not LOCAL_PROPAGATE? ──→ drop
//!   └─ push to live queue, run a dispatch pass (unless async)
//! ```
//!
//! # Cascades
//!
//! Only one dispatch pass runs at a time. A `send` made while a pass is
//! running (from a handler, or from another thread) only enqueues; the
//! running pass delivers it after the messages already queued. Cascades
//! are therefore breadth-first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use tracing::{debug, trace, warn};

use crate::filter::TypeFilterTable;
use crate::propagation::{should_deliver_locally, should_net_propagate};
use crate::queue::{DeferredQueue, MsgWrap};
use crate::{
    BroadcastFlags, Clock, DispatchConfig, MessageRef, MsgClass, NetPropagator, ReceiverHandle,
    ReceiverKey, TimeAdvanced,
};

/// Work discarded by [`Dispatcher::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    pub live: usize,
    pub deferred: usize,
    pub posted: usize,
}

/// Locks a mutex, ignoring poisoning. A handler that panicked mid-pass
/// leaves the queues themselves consistent.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the single-pass guard even if a handler unwinds.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Clears this thread's delivering slot even if a handler unwinds.
struct DeliveringGuard<'a> {
    delivering: &'a Mutex<HashMap<ThreadId, MessageRef>>,
    thread: ThreadId,
}

impl Drop for DeliveringGuard<'_> {
    fn drop(&mut self) {
        lock(self.delivering).remove(&self.thread);
    }
}

pub struct Dispatcher {
    config: DispatchConfig,
    clock: Arc<dyn Clock>,
    filters: RwLock<TypeFilterTable>,
    live: Mutex<VecDeque<MsgWrap>>,
    deferred: Mutex<DeferredQueue>,
    posted: Mutex<Vec<MessageRef>>,
    /// The message each thread is currently delivering, if any.
    delivering: Mutex<HashMap<ThreadId, MessageRef>>,
    dispatching: AtomicBool,
    buffering: AtomicUsize,
    propagator: RwLock<Option<Arc<dyn NetPropagator>>>,
}

impl Dispatcher {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(DispatchConfig::default(), clock)
    }

    pub fn with_config(config: DispatchConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: config.validated(),
            clock,
            filters: RwLock::new(TypeFilterTable::default()),
            live: Mutex::new(VecDeque::new()),
            deferred: Mutex::new(DeferredQueue::default()),
            posted: Mutex::new(Vec::new()),
            delivering: Mutex::new(HashMap::new()),
            dispatching: AtomicBool::new(false),
            buffering: AtomicUsize::new(0),
            propagator: RwLock::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Sends a message.
    ///
    /// Returns true if the message was queued for local delivery or
    /// deferred to a later time. With `async_dispatch` the message is only
    /// queued; otherwise a dispatch pass runs before returning (unless one
    /// is already running or buffering is on).
    pub fn send(&self, msg: impl Into<MessageRef>, async_dispatch: bool) -> bool {
        let msg = msg.into();

        let at = msg.timestamp();
        if at > self.clock.now() {
            self.defer(at, msg);
            return true;
        }

        let mut released = 0;
        if msg.class() == MsgClass::TIME_ADVANCED {
            let until = msg
                .payload::<TimeAdvanced>()
                .map_or_else(|| self.clock.now(), |t| t.seconds);
            released = self.release_deferred(until);
        }

        let receivers = self.resolve_receivers(&msg);

        let parent = self.current_message();
        msg.inherit_net_flags(parent.as_deref(), false);
        self.maybe_propagate(&msg);

        let queued = self.enqueue(msg, receivers);
        if !async_dispatch && (queued || released > 0) {
            self.dispatch_pass();
        }
        queued
    }

    fn enqueue(&self, msg: MessageRef, receivers: Vec<ReceiverHandle>) -> bool {
        if !should_deliver_locally(msg.flags()) {
            trace!(class = %msg.class(), "not flagged for local delivery, dropping");
            return false;
        }
        if receivers.is_empty() {
            trace!(class = %msg.class(), "no receivers, dropping");
            return false;
        }

        let queued = {
            let mut live = lock(&self.live);
            live.push_back(MsgWrap { msg, receivers });
            live.len()
        };
        if queued == self.config.live_warn_len + 1 {
            warn!(queued, threshold = self.config.live_warn_len, "live queue is growing");
        }
        true
    }

    /// Queues a message from any thread without dispatching. The dispatch
    /// thread sends it on its next [`Self::process_posted`].
    pub fn post(&self, msg: impl Into<MessageRef>) {
        lock(&self.posted).push(msg.into());
    }

    /// Sends every posted message, in posting order, then runs one
    /// dispatch pass. Returns how many were posted.
    pub fn process_posted(&self) -> usize {
        let posted = std::mem::take(&mut *lock(&self.posted));
        let n = posted.len();
        for msg in posted {
            self.send(msg, true);
        }
        if n > 0 {
            self.dispatch_pass();
        }
        n
    }

    fn defer(&self, at: f64, msg: MessageRef) {
        let pending = {
            let mut deferred = lock(&self.deferred);
            deferred.push(at, msg);
            deferred.len()
        };
        trace!(at, pending, "deferred message");
        if pending == self.config.deferred_warn_len + 1 {
            warn!(pending, threshold = self.config.deferred_warn_len, "deferred queue is growing");
        }
    }

    /// Re-sends every deferred message due at or before `until`, earliest
    /// first, and returns how many there were. They are only queued here;
    /// the caller's pass delivers them.
    fn release_deferred(&self, until: f64) -> usize {
        let mut released = 0;
        loop {
            // Pop under the lock, send without it.
            let Some(msg) = lock(&self.deferred).pop_due(until) else {
                break;
            };
            msg.set_timestamp(0.0);
            self.send(msg, true);
            released += 1;
        }
        if released > 0 {
            debug!(released, until, "released deferred messages");
        }
        released
    }

    fn resolve_receivers(&self, msg: &MessageRef) -> Vec<ReceiverHandle> {
        let flags = msg.flags();
        if !flags.contains(BroadcastFlags::BCAST_BY_EXACT_TYPE) {
            return msg.receivers().to_vec();
        }
        if flags.contains(BroadcastFlags::CLEAR_AFTER_BCAST) {
            let receivers = self
                .filters
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take(msg.class());
            debug!(class = %msg.class(), receivers = receivers.len(), "cleared filter after broadcast");
            receivers
        } else {
            self.filters
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .receivers(msg.class())
        }
    }

    fn maybe_propagate(&self, msg: &MessageRef) {
        if !should_net_propagate(msg.flags()) {
            return;
        }
        let propagator = self
            .propagator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(propagator) = propagator else {
            trace!(class = %msg.class(), "no propagator installed");
            return;
        };
        if propagator.propagate(msg) {
            msg.insert_flags(BroadcastFlags::NET_SENT);
        }
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    fn dispatch_pass(&self) {
        loop {
            if self.buffering.load(Ordering::Acquire) > 0 {
                return;
            }
            if self
                .dispatching
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // Someone else is delivering and will reach our message.
                return;
            }

            {
                let _pass = PassGuard(&self.dispatching);
                while self.buffering.load(Ordering::Acquire) == 0 {
                    let Some(wrap) = lock(&self.live).pop_front() else {
                        break;
                    };
                    self.deliver(wrap);
                }
            }

            // A send from another thread may have landed after our last pop
            // but before the guard was released, and given up on the guard.
            if self.buffering.load(Ordering::Acquire) > 0 || lock(&self.live).is_empty() {
                return;
            }
        }
    }

    fn deliver(&self, wrap: MsgWrap) {
        let MsgWrap { msg, receivers } = wrap;
        let remote = msg.has_flags(BroadcastFlags::NET_NON_LOCAL);
        let thread = thread::current().id();
        lock(&self.delivering).insert(thread, Arc::clone(&msg));
        let _slot = DeliveringGuard { delivering: &self.delivering, thread };

        for handle in &receivers {
            let Some(receiver) = handle.resolve() else {
                trace!(key = %handle.key(), "receiver gone, skipping");
                continue;
            };
            if remote && !receiver.is_net_synched() {
                trace!(key = %handle.key(), class = %msg.class(), "receiver not net synched, skipping");
                continue;
            }
            let handled = receiver.msg_receive(&msg, self);
            trace!(key = %handle.key(), class = %msg.class(), handled, "delivered");
        }
    }

    /// The message this thread is delivering right now.
    fn current_message(&self) -> Option<MessageRef> {
        lock(&self.delivering).get(&thread::current().id()).cloned()
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Registers a receiver for broadcasts of `class`. Registering the same
    /// key twice is a no-op.
    pub fn register_for_exact_type(&self, class: MsgClass, handle: ReceiverHandle) {
        let key = handle.key();
        let added = self
            .filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(class, handle);
        if added {
            debug!(%class, %key, "registered receiver");
        }
    }

    pub fn unregister_for_exact_type(&self, class: MsgClass, key: ReceiverKey) {
        let removed = self
            .filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unregister(class, key);
        if removed {
            debug!(%class, %key, "unregistered receiver");
        }
    }

    /// Removes `key` from every class it is registered for.
    pub fn unregister_all(&self, key: ReceiverKey) {
        let removed = self
            .filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unregister_all(key);
        if removed > 0 {
            debug!(%key, removed, "unregistered receiver from all classes");
        }
    }

    /// Keys registered for `class`, in registration order.
    pub fn receivers_for(&self, class: MsgClass) -> Vec<ReceiverKey> {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .receivers(class)
            .iter()
            .map(ReceiverHandle::key)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Buffering, propagation, lifecycle
    // -----------------------------------------------------------------------

    /// Suspends (`true`) or resumes (`false`) delivery. Calls nest: delivery
    /// resumes when every suspend has been matched, and then the queue is
    /// flushed at once.
    pub fn set_msg_buffering(&self, on: bool) {
        if on {
            let depth = self.buffering.fetch_add(1, Ordering::AcqRel) + 1;
            trace!(depth, "buffering on");
            return;
        }

        let released = self
            .buffering
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| d.checked_sub(1));
        match released {
            Ok(1) => {
                trace!("buffering off, flushing");
                self.dispatch_pass();
            }
            Ok(prev) => trace!(depth = prev - 1, "buffering released one level"),
            Err(_) => {
                warn!("set_msg_buffering(false) without a matching set_msg_buffering(true)");
                debug_assert!(false, "unbalanced set_msg_buffering(false)");
            }
        }
    }

    pub fn set_propagator(&self, propagator: Arc<dyn NetPropagator>) {
        *self.propagator.write().unwrap_or_else(PoisonError::into_inner) = Some(propagator);
    }

    pub fn clear_propagator(&self) {
        *self.propagator.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Discards all pending work without delivering it.
    pub fn shutdown(&self) -> ShutdownReport {
        let report = ShutdownReport {
            live: {
                let mut live = lock(&self.live);
                let n = live.len();
                live.clear();
                n
            },
            deferred: lock(&self.deferred).clear(),
            posted: {
                let mut posted = lock(&self.posted);
                let n = posted.len();
                posted.clear();
                n
            },
        };
        debug!(?report, "dispatcher shut down");
        report
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn is_dispatching(&self) -> bool {
        self.dispatching.load(Ordering::Acquire)
    }

    pub fn buffering_depth(&self) -> usize {
        self.buffering.load(Ordering::Acquire)
    }

    pub fn live_len(&self) -> usize {
        lock(&self.live).len()
    }

    pub fn deferred_len(&self) -> usize {
        lock(&self.deferred).len()
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }
}

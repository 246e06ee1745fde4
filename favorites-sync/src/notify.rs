//! Subscription and notification layer.
//!
//! Events are queued while the engine holds its state lock, which fixes
//! their order, and delivered afterwards by whichever caller wins the
//! dispatch flag. Callbacks therefore never run under the state lock and
//! may call back into the engine; anything they trigger is queued behind
//! the event being delivered.

use crate::state::{CategoryStatus, ToggleFailure};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Callback invoked for every event delivered to a subscriber.
pub type Callback = Arc<dyn Fn(&FavoritesEvent) + Send + Sync>;

/// Identifies one subscription. Dropping it does not unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

/// Something observers of the engine are told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoritesEvent {
    /// A category's favorites or sync state changed.
    Updated(CategoryStatus),
    /// A toggle was rolled back after the gateway rejected it.
    ToggleFailed(ToggleFailure),
}

struct Subscriber {
    callback: Callback,
    /// First sequence number this subscriber may see.
    since: u64,
}

struct Queued {
    seq: u64,
    target: Option<SubscriptionHandle>,
    event: FavoritesEvent,
}

/// Fan-out of engine events to subscribers, preserving enqueue order.
pub(crate) struct Notifier {
    subscribers: Mutex<BTreeMap<SubscriptionHandle, Subscriber>>,
    queue: Mutex<VecDeque<Queued>>,
    next_seq: AtomicU64,
    next_handle: AtomicU64,
    dispatching: AtomicBool,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscribers.lock().len())
            .field("queued", &self.queue.lock().len())
            .finish()
    }
}

impl Notifier {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            queue: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(0),
            next_handle: AtomicU64::new(1),
            dispatching: AtomicBool::new(false),
        }
    }

    /// Queues an event for every current subscriber.
    pub(crate) fn enqueue(&self, event: FavoritesEvent) {
        let mut queue = self.queue.lock();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        queue.push_back(Queued {
            seq,
            target: None,
            event,
        });
    }

    /// Registers a subscriber and queues `initial` for it alone.
    ///
    /// The subscriber sees nothing queued before its initial events.
    pub(crate) fn register(
        &self,
        callback: Callback,
        initial: Vec<FavoritesEvent>,
    ) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let mut queue = self.queue.lock();
        let since = self.next_seq.load(Ordering::SeqCst);
        for event in initial {
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            queue.push_back(Queued {
                seq,
                target: Some(handle),
                event,
            });
        }
        self.subscribers
            .lock()
            .insert(handle, Subscriber { callback, since });
        debug!("Registered subscription {:?}", handle);
        handle
    }

    /// Removes a subscriber. Returns false if it was already gone.
    pub(crate) fn unregister(&self, handle: SubscriptionHandle) -> bool {
        let removed = self.subscribers.lock().remove(&handle).is_some();
        if removed {
            debug!("Removed subscription {:?}", handle);
        }
        removed
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Delivers every queued event. Must not be called under the engine
    /// state lock.
    ///
    /// Returns without delivering if another caller is already dispatching;
    /// that caller drains the queue, including anything queued here.
    pub(crate) fn flush(&self) {
        loop {
            if self
                .dispatching
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                // The current dispatcher drains whatever we queued.
                return;
            }
            {
                let _guard = DispatchGuard(&self.dispatching);
                while let Some(item) = self.pop() {
                    for callback in self.recipients(&item) {
                        callback(&item.event);
                    }
                }
            }
            if self.queue.lock().is_empty() {
                return;
            }
        }
    }

    fn pop(&self) -> Option<Queued> {
        self.queue.lock().pop_front()
    }

    fn recipients(&self, item: &Queued) -> Vec<Callback> {
        let subscribers = self.subscribers.lock();
        match item.target {
            Some(handle) => subscribers
                .get(&handle)
                .map(|s| vec![s.callback.clone()])
                .unwrap_or_default(),
            None => subscribers
                .values()
                .filter(|s| s.since <= item.seq)
                .map(|s| s.callback.clone())
                .collect(),
        }
    }
}

/// Clears the dispatch flag even if a callback panics.
struct DispatchGuard<'a>(&'a AtomicBool);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

//! Last-value slot with explicit subscriber lifetimes
//!
//! Publishers `post` values; every active subscriber gets each new value once.
//! A subscriber that registers late, or is reactivated after a pause, is
//! handed the most recent value if it has not seen it yet.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::error;

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Observer<T> {
    id: u64,
    active: AtomicBool,
    /// Version of the last value handed to this observer
    seen_version: AtomicU64,
    callback: Callback<T>,
}

impl<T> Observer<T> {
    /// Deliver `value` unless the observer is paused or already saw this
    /// version (or a newer one). A panicking callback is logged and does not
    /// reach the posting thread.
    fn offer(&self, value: &T, version: u64) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        if self.seen_version.fetch_max(version, Ordering::SeqCst) < version
            && catch_unwind(AssertUnwindSafe(|| (self.callback)(value))).is_err()
        {
            error!("Subscriber {} panicked while handling a posted value", self.id);
        }
    }
}

struct SlotInner<T> {
    value: Option<T>,
    version: u64,
    observers: Vec<Arc<Observer<T>>>,
    next_id: u64,
}

/// Single-slot broadcast holder that replays its latest value
pub struct LastValueSlot<T> {
    inner: Arc<Mutex<SlotInner<T>>>,
}

impl<T> Clone for LastValueSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for LastValueSlot<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LastValueSlot<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty slot
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotInner {
                value: None,
                version: 0,
                observers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Replace the held value and notify active subscribers
    ///
    /// Callbacks run on the posting thread, after the slot lock is released.
    pub fn post(&self, value: T) {
        let (observers, version) = {
            let mut inner = self.inner.lock();
            inner.value = Some(value.clone());
            inner.version += 1;
            (inner.observers.clone(), inner.version)
        };

        for observer in observers {
            observer.offer(&value, version);
        }
    }

    /// Current value, if anything has been posted
    pub fn value(&self) -> Option<T> {
        self.inner.lock().value.clone()
    }

    /// Number of values posted so far
    pub fn version(&self) -> u64 {
        self.inner.lock().version
    }

    /// Number of registered subscriptions (active or paused)
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().observers.len()
    }

    /// Register an active subscriber. If a value is already held it is
    /// delivered right away, on the calling thread.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription<T> {
        let (observer, current) = {
            let mut inner = self.inner.lock();
            let observer = Arc::new(Observer {
                id: inner.next_id,
                active: AtomicBool::new(true),
                seen_version: AtomicU64::new(0),
                callback: Box::new(callback),
            });
            inner.next_id += 1;
            inner.observers.push(observer.clone());
            let current = inner.value.clone().map(|v| (v, inner.version));
            (observer, current)
        };

        if let Some((value, version)) = current {
            observer.offer(&value, version);
        }

        Subscription {
            slot: Arc::downgrade(&self.inner),
            observer,
        }
    }
}

/// A registered subscriber. Dropping it unsubscribes.
pub struct Subscription<T> {
    slot: Weak<Mutex<SlotInner<T>>>,
    observer: Arc<Observer<T>>,
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Stop receiving values until `resume` is called
    pub fn pause(&self) {
        self.observer.active.store(false, Ordering::SeqCst);
    }

    /// Start receiving values again, replaying the latest one if it was missed
    pub fn resume(&self) {
        self.observer.active.store(true, Ordering::SeqCst);
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let current = {
            let inner = slot.lock();
            inner.value.clone().map(|v| (v, inner.version))
        };
        if let Some((value, version)) = current {
            self.observer.offer(&value, version);
        }
    }

    pub fn is_active(&self) -> bool {
        self.observer.active.load(Ordering::SeqCst)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.upgrade() {
            let id = self.observer.id;
            slot.lock().observers.retain(|o| o.id != id);
        }
    }
}

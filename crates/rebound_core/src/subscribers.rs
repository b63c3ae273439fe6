//! Subscriber registries
//!
//! Values notify their consumers through a [`Subscribers`] list. Callbacks are
//! snapshotted and invoked with the registry lock released, so a callback may
//! subscribe, unsubscribe or read the value it is observing. A panicking
//! callback is caught and logged; the remaining callbacks still run.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::sync::lock;

new_key_type! {
    /// Identifier returned by `subscribe`, used to unsubscribe
    pub struct SubscriptionId;
}

/// A shared notification callback
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// An ordered set of callbacks notified with a value of type `T`
pub struct Subscribers<T> {
    entries: Mutex<SlotMap<SubscriptionId, Callback<T>>>,
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Register a callback
    pub fn insert(&self, callback: Callback<T>) -> SubscriptionId {
        lock(&self.entries).insert(callback)
    }

    /// Remove a callback, returning whether it was registered
    pub fn remove(&self, id: SubscriptionId) -> bool {
        lock(&self.entries).remove(id).is_some()
    }

    /// Drop every callback
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Notify every registered callback.
    ///
    /// Returns the number of callbacks that panicked.
    pub fn notify(&self, value: &T) -> usize {
        let callbacks: SmallVec<[Callback<T>; 4]> =
            lock(&self.entries).values().cloned().collect();

        callbacks
            .iter()
            .filter(|callback| !call_isolated("subscriber", || callback(value)))
            .count()
    }

    /// Invoke a single callback by id, if it is still registered
    pub fn notify_one(&self, id: SubscriptionId, value: &T) -> bool {
        let callback = lock(&self.entries).get(id).cloned();
        match callback {
            Some(callback) => call_isolated("subscriber", || callback(value)),
            None => false,
        }
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.len())
            .finish()
    }
}

/// Run a user callback, catching and logging a panic.
///
/// Returns `true` if the callback completed normally.
pub fn call_isolated<F: FnOnce()>(what: &str, f: F) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!("{} panicked: {}", what, panic_message(payload.as_ref()));
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

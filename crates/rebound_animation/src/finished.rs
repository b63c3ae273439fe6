//! Completion signals
//!
//! [`Finished`] resolves with the settled value when a spring run comes to
//! rest at its target. It is cheap to clone, can be awaited from any executor
//! and also accepts plain callbacks for hosts without one.

use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use indexmap::IndexMap;
use rebound_core::{call_isolated, lock};
use smallvec::SmallVec;

type ResolveCallback = Box<dyn FnOnce(f64) + Send>;

#[derive(Default)]
struct Signal {
    value: Option<f64>,
    wakers: SmallVec<[Waker; 2]>,
    callbacks: Vec<ResolveCallback>,
}

/// Resolves once with the value a spring settled on
#[derive(Clone)]
pub struct Finished {
    signal: Arc<Mutex<Signal>>,
}

impl Finished {
    pub(crate) fn pending() -> Self {
        Self {
            signal: Arc::new(Mutex::new(Signal::default())),
        }
    }

    /// An already resolved signal
    pub fn resolved(value: f64) -> Self {
        let finished = Self::pending();
        lock(&finished.signal).value = Some(value);
        finished
    }

    pub fn is_resolved(&self) -> bool {
        lock(&self.signal).value.is_some()
    }

    /// The settled value, if resolved
    pub fn value(&self) -> Option<f64> {
        lock(&self.signal).value
    }

    /// Run `callback` on resolution, or right away if already resolved
    pub fn on_resolve<F: FnOnce(f64) + Send + 'static>(&self, callback: F) {
        let value = {
            let mut signal = lock(&self.signal);
            match signal.value {
                Some(value) => value,
                None => {
                    signal.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        call_isolated("finished callback", || callback(value));
    }

    /// Resolve with `value`; later calls are ignored
    pub(crate) fn resolve(&self, value: f64) -> bool {
        let (wakers, callbacks) = {
            let mut signal = lock(&self.signal);
            if signal.value.is_some() {
                return false;
            }
            signal.value = Some(value);
            (
                std::mem::take(&mut signal.wakers),
                std::mem::take(&mut signal.callbacks),
            )
        };

        for waker in wakers {
            waker.wake();
        }
        for callback in callbacks {
            call_isolated("finished callback", || callback(value));
        }
        true
    }

    /// Whether both handles observe the same run
    pub fn ptr_eq(&self, other: &Finished) -> bool {
        Arc::ptr_eq(&self.signal, &other.signal)
    }
}

impl Future for Finished {
    type Output = f64;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<f64> {
        let mut signal = lock(&self.signal);
        match signal.value {
            Some(value) => Poll::Ready(value),
            None => {
                if !signal.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    signal.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl std::fmt::Debug for Finished {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finished")
            .field("value", &self.value())
            .finish()
    }
}

/// Resolves when every channel of a group that was running has settled
pub struct GroupFinished<K> {
    channels: Vec<(K, Finished)>,
}

impl<K: Hash + Eq + Clone> GroupFinished<K> {
    pub(crate) fn new(channels: Vec<(K, Finished)>) -> Self {
        Self { channels }
    }

    pub fn is_resolved(&self) -> bool {
        self.channels.iter().all(|(_, finished)| finished.is_resolved())
    }

    /// Settled values per channel once every channel resolved
    pub fn values(&self) -> Option<IndexMap<K, f64>> {
        self.channels
            .iter()
            .map(|(key, finished)| finished.value().map(|value| (key.clone(), value)))
            .collect()
    }
}

impl<K> Clone for GroupFinished<K>
where
    K: Clone,
{
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
        }
    }
}

// Nothing inside is structurally pinned
impl<K> Unpin for GroupFinished<K> {}

impl<K: Hash + Eq + Clone> Future for GroupFinished<K> {
    type Output = IndexMap<K, f64>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut values = IndexMap::with_capacity(this.channels.len());
        let mut pending = false;

        for (key, finished) in &mut this.channels {
            match Pin::new(finished).poll(cx) {
                Poll::Ready(value) => {
                    values.insert(key.clone(), value);
                }
                Poll::Pending => pending = true,
            }
        }

        if pending {
            Poll::Pending
        } else {
            Poll::Ready(values)
        }
    }
}

impl<K: std::fmt::Debug> std::fmt::Debug for GroupFinished<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.channels.iter().map(|(k, v)| (k, v.value())))
            .finish()
    }
}

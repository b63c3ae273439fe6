//! Derived values
//!
//! A [`Derived`] value is computed from one or more sources by a pure mapping
//! function. It recomputes eagerly whenever a source reports a change and
//! exposes the same read/subscribe surface as its sources, so derived values
//! compose with springs, motion values and each other.

use std::sync::{Arc, Mutex, Weak};

use rebound_core::{
    call_isolated, finite_or_zero, lock, Callback, IntoSource, SourceRef, SubscriptionId,
    Subscribers, ValueSource,
};
use slotmap::Key;
use smallvec::SmallVec;

use crate::transform::RangeMap;

type MapFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

struct DerivedState {
    inputs: SmallVec<[f64; 4]>,
    value: f64,
    sources: Vec<(SourceRef, SubscriptionId)>,
    destroyed: bool,
}

struct DerivedInner {
    state: Mutex<DerivedState>,
    map: MapFn,
    subscribers: Subscribers<f64>,
}

impl DerivedInner {
    fn input_changed(&self, index: usize, value: f64) {
        let inputs = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return;
            }
            match state.inputs.get_mut(index) {
                Some(slot) if *slot != value => *slot = value,
                _ => return,
            }
            state.inputs.clone()
        };

        let Some(value) = self.compute(&inputs) else {
            return;
        };

        {
            let mut state = lock(&self.state);
            if state.destroyed || state.value == value {
                return;
            }
            state.value = value;
        }
        self.subscribers.notify(&value);
    }

    /// Run the mapping, `None` if it panicked
    fn compute(&self, inputs: &[f64]) -> Option<f64> {
        let mut output = None;
        call_isolated("derived mapping", || output = Some((self.map)(inputs)));
        output.map(finite_or_zero)
    }

    fn release(sources: Vec<(SourceRef, SubscriptionId)>) {
        for (source, id) in sources {
            source.unsubscribe(id);
        }
    }
}

impl Drop for DerivedInner {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self::release(std::mem::take(&mut state.sources));
    }
}

/// A read-only value computed from other values
///
/// ```rust
/// use rebound_animation::{Derived, MotionValue};
///
/// let width = MotionValue::new(10.0);
/// let height = MotionValue::new(4.0);
/// let area = Derived::combine([width.clone(), height.clone()], |v| v[0] * v[1]);
///
/// assert_eq!(area.get(), 40.0);
/// width.set(20.0);
/// assert_eq!(area.get(), 80.0);
/// ```
#[derive(Clone)]
pub struct Derived {
    inner: Arc<DerivedInner>,
}

impl Derived {
    /// Combine any number of sources. The mapping receives the latest value of
    /// every source, in the order given.
    pub fn combine<I, F>(sources: I, map: F) -> Self
    where
        I: IntoIterator,
        I::Item: IntoSource,
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        let sources: Vec<SourceRef> = sources.into_iter().map(IntoSource::into_source).collect();
        let inputs: SmallVec<[f64; 4]> = sources
            .iter()
            .map(|source| finite_or_zero(source.get()))
            .collect();

        let inner = Arc::new(DerivedInner {
            state: Mutex::new(DerivedState {
                inputs,
                value: 0.0,
                sources: Vec::with_capacity(sources.len()),
                destroyed: false,
            }),
            map: Arc::new(map),
            subscribers: Subscribers::new(),
        });

        let initial = lock(&inner.state).inputs.clone();
        let value = inner.compute(&initial).unwrap_or(0.0);
        lock(&inner.state).value = value;

        for (index, source) in sources.into_iter().enumerate() {
            let weak: Weak<DerivedInner> = Arc::downgrade(&inner);
            let id = source.subscribe_callback(Arc::new(move |value: &f64| {
                if let Some(inner) = weak.upgrade() {
                    inner.input_changed(index, finite_or_zero(*value));
                }
            }));
            lock(&inner.state).sources.push((source, id));
        }

        Self { inner }
    }

    /// Derive from a single source
    pub fn map<S, F>(source: S, map: F) -> Self
    where
        S: IntoSource,
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self::combine([source.into_source()], move |inputs| map(inputs[0]))
    }

    /// Derive by passing a single source through a [`RangeMap`]
    pub fn transform<S: IntoSource>(source: S, range: RangeMap) -> Self {
        Self::map(source, move |x| range.apply(x))
    }

    pub fn get(&self) -> f64 {
        lock(&self.inner.state).value
    }

    /// Observe the value; `callback` runs immediately and on every change
    pub fn subscribe<F: Fn(f64) + Send + Sync + 'static>(&self, callback: F) -> SubscriptionId {
        self.subscribe_callback(Arc::new(move |value: &f64| callback(*value)))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        !id.is_null() && self.inner.subscribers.remove(id)
    }

    /// Stop tracking the sources and freeze the value
    pub fn destroy(&self) {
        let sources = {
            let mut state = lock(&self.inner.state);
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            std::mem::take(&mut state.sources)
        };
        DerivedInner::release(sources);
        self.inner.subscribers.clear();
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner.state).destroyed
    }

    pub fn source_count(&self) -> usize {
        lock(&self.inner.state).sources.len()
    }
}

impl ValueSource for Derived {
    fn get(&self) -> f64 {
        Derived::get(self)
    }

    fn subscribe_callback(&self, callback: Callback<f64>) -> SubscriptionId {
        if self.is_destroyed() {
            return SubscriptionId::default();
        }
        let id = self.inner.subscribers.insert(callback);
        self.inner.subscribers.notify_one(id, &self.get());
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        Derived::unsubscribe(self, id)
    }
}

impl std::fmt::Debug for Derived {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("Derived")
            .field("value", &state.value)
            .field("sources", &state.sources.len())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

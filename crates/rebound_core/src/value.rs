//! Value sources
//!
//! Springs, directly driven values and derived values all expose the same
//! read/subscribe surface so they can be composed without knowing what sits
//! underneath.

use std::sync::Arc;

use crate::subscribers::{Callback, SubscriptionId};

/// A readable, observable numeric value
pub trait ValueSource: Send + Sync {
    /// Current value
    fn get(&self) -> f64;

    /// Register a change callback.
    ///
    /// Implementations call the callback once immediately with the current
    /// value, then on every subsequent change.
    fn subscribe_callback(&self, callback: Callback<f64>) -> SubscriptionId;

    /// Remove a callback registered with [`ValueSource::subscribe_callback`]
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// A type-erased, shared value source
pub type SourceRef = Arc<dyn ValueSource>;

/// Conversion into a [`SourceRef`]
pub trait IntoSource {
    fn into_source(self) -> SourceRef;
}

impl<S: ValueSource + 'static> IntoSource for S {
    fn into_source(self) -> SourceRef {
        Arc::new(self)
    }
}

impl IntoSource for SourceRef {
    fn into_source(self) -> SourceRef {
        self
    }
}

/// Replace a non-finite number with `0.0`
#[inline]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Replace a non-finite input with `0.0`, logging the substitution
pub fn sanitize(value: f64, what: &str) -> f64 {
    if value.is_finite() {
        value
    } else {
        tracing::warn!("non-finite {} ({}) replaced with 0", what, value);
        0.0
    }
}

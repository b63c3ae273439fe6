//! Directly driven values
//!
//! A [`MotionValue`] is a plain observable number. It can be written directly,
//! made to follow any other [`ValueSource`], or animated by an internally
//! owned spring. Writing it directly always detaches whatever was driving it.

use std::sync::{Arc, Mutex, Weak};

use rebound_core::{
    lock, sanitize, Callback, IntoSource, SourceRef, SubscriptionId, Subscribers, ValueSource,
};
use slotmap::Key;

use crate::animated::AnimatedValue;
use crate::config::SpringOptions;
use crate::finished::Finished;
use crate::scheduler::{global_scheduler, SchedulerHandle};

struct Driver {
    source: SourceRef,
    subscription: SubscriptionId,
    /// Spring created by `animate_to`, if that is what drives the value
    spring: Option<AnimatedValue>,
}

impl Driver {
    fn release(self) {
        self.source.unsubscribe(self.subscription);
        if let Some(spring) = self.spring {
            spring.stop();
        }
    }
}

struct MotionState {
    value: f64,
    driver: Option<Driver>,
    /// Incremented whenever the driver changes; stale driver callbacks compare
    /// against it and bail out
    generation: u64,
    destroyed: bool,
}

struct MotionInner {
    state: Mutex<MotionState>,
    subscribers: Subscribers<f64>,
    scheduler: SchedulerHandle,
}

impl MotionInner {
    /// Store `value` and notify, if the write is still current
    fn apply(&self, generation: Option<u64>, value: f64) {
        {
            let mut state = lock(&self.state);
            if state.destroyed || generation.is_some_and(|g| g != state.generation) {
                return;
            }
            if state.value == value {
                return;
            }
            state.value = value;
        }
        self.subscribers.notify(&value);
    }

    fn detach(&self) -> Option<Driver> {
        let mut state = lock(&self.state);
        state.generation += 1;
        state.driver.take()
    }
}

impl Drop for MotionInner {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(driver) = state.driver.take() {
            driver.release();
        }
    }
}

/// An observable number that can be set, followed or animated
#[derive(Clone)]
pub struct MotionValue {
    inner: Arc<MotionInner>,
}

impl MotionValue {
    /// A value animating on the global scheduler
    pub fn new(initial: f64) -> Self {
        Self::with_scheduler(global_scheduler(), initial)
    }

    pub fn with_scheduler(scheduler: SchedulerHandle, initial: f64) -> Self {
        Self {
            inner: Arc::new(MotionInner {
                state: Mutex::new(MotionState {
                    value: sanitize(initial, "initial value"),
                    driver: None,
                    generation: 0,
                    destroyed: false,
                }),
                subscribers: Subscribers::new(),
                scheduler,
            }),
        }
    }

    pub fn get(&self) -> f64 {
        lock(&self.inner.state).value
    }

    /// Write the value, detaching any driver
    pub fn set(&self, value: f64) {
        let value = sanitize(value, "motion value");
        if self.is_destroyed() {
            return;
        }
        if let Some(driver) = self.inner.detach() {
            driver.release();
        }
        self.inner.apply(None, value);
    }

    /// Mirror `source` until the value is set, animated or destroyed
    pub fn follow(&self, source: impl IntoSource) {
        self.attach(source.into_source(), None);
    }

    /// Spring toward `target` from the current value.
    ///
    /// An animation already in flight is retargeted and keeps its velocity.
    pub fn animate_to(&self, target: f64, options: impl Into<SpringOptions>) -> Finished {
        let options = options.into();

        let running = {
            let state = lock(&self.inner.state);
            if state.destroyed {
                return Finished::resolved(state.value);
            }
            state.driver.as_ref().and_then(|driver| driver.spring.clone())
        };
        if let Some(spring) = running {
            spring.set_with(target, options);
            return spring.finished();
        }

        let spring = AnimatedValue::new(
            self.inner.scheduler.clone(),
            self.get(),
            SpringOptions::default(),
        );
        let source: SourceRef = Arc::new(spring.clone());
        self.attach(source, Some(spring.clone()));
        spring.set_with(target, options);
        spring.finished()
    }

    /// Halt an animation at the current value and detach from any driver
    pub fn stop(&self) {
        if let Some(driver) = self.inner.detach() {
            driver.release();
        }
    }

    /// Whether an owned spring is currently moving the value
    pub fn is_animating(&self) -> bool {
        lock(&self.inner.state)
            .driver
            .as_ref()
            .and_then(|driver| driver.spring.as_ref())
            .is_some_and(AnimatedValue::is_animating)
    }

    /// Velocity of the owned spring, `0.0` when not animating
    pub fn velocity(&self) -> f64 {
        lock(&self.inner.state)
            .driver
            .as_ref()
            .and_then(|driver| driver.spring.as_ref())
            .map_or(0.0, AnimatedValue::velocity)
    }

    /// Whether the value is following another source or a spring
    pub fn is_driven(&self) -> bool {
        lock(&self.inner.state).driver.is_some()
    }

    /// Observe the value; `callback` runs immediately and on every change
    pub fn subscribe<F: Fn(f64) + Send + Sync + 'static>(&self, callback: F) -> SubscriptionId {
        self.subscribe_callback(Arc::new(move |value: &f64| callback(*value)))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.remove(id)
    }

    pub fn destroy(&self) {
        let driver = {
            let mut state = lock(&self.inner.state);
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.generation += 1;
            state.driver.take()
        };
        if let Some(driver) = driver {
            driver.release();
        }
        self.inner.subscribers.clear();
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner.state).destroyed
    }

    fn attach(&self, source: SourceRef, spring: Option<AnimatedValue>) {
        let generation = {
            let mut state = lock(&self.inner.state);
            if state.destroyed {
                return;
            }
            state.generation += 1;
            if let Some(previous) = state.driver.take() {
                drop(state);
                previous.release();
                state = lock(&self.inner.state);
            }
            state.generation
        };

        let weak: Weak<MotionInner> = Arc::downgrade(&self.inner);
        let subscription = source.subscribe_callback(Arc::new(move |value: &f64| {
            if let Some(inner) = weak.upgrade() {
                inner.apply(Some(generation), *value);
            }
        }));

        let stale = {
            let mut state = lock(&self.inner.state);
            if state.destroyed || state.generation != generation {
                true
            } else {
                state.driver = Some(Driver {
                    source: source.clone(),
                    subscription,
                    spring: spring.clone(),
                });
                false
            }
        };
        if stale {
            Driver {
                source,
                subscription,
                spring,
            }
            .release();
        }
    }
}

impl ValueSource for MotionValue {
    fn get(&self) -> f64 {
        MotionValue::get(self)
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
        !id.is_null() && self.inner.subscribers.remove(id)
    }
}

impl std::fmt::Debug for MotionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("MotionValue")
            .field("value", &state.value)
            .field("driven", &state.driver.is_some())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpringConfig;
    use crate::scheduler::AnimationScheduler;

    fn recorder(value: &MotionValue) -> Arc<Mutex<Vec<f64>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        value.subscribe(move |v| seen_clone.lock().unwrap().push(v));
        seen
    }

    #[test]
    fn test_set_notifies_on_change_only() {
        let scheduler = AnimationScheduler::new();
        let value = MotionValue::with_scheduler(scheduler.handle(), 1.0);
        let seen = recorder(&value);

        value.set(2.0);
        value.set(2.0);
        value.set(f64::NAN);
        assert_eq!(*seen.lock().unwrap(), vec![1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_follow_mirrors_source() {
        let scheduler = AnimationScheduler::new();
        let source = MotionValue::with_scheduler(scheduler.handle(), 5.0);
        let value = MotionValue::with_scheduler(scheduler.handle(), 0.0);

        value.follow(source.clone());
        assert_eq!(value.get(), 5.0);
        assert!(value.is_driven());

        source.set(7.0);
        assert_eq!(value.get(), 7.0);

        // A direct write detaches
        value.set(1.0);
        source.set(9.0);
        assert_eq!(value.get(), 1.0);
        assert!(!value.is_driven());
    }

    #[test]
    fn test_animate_to_drives_value() {
        let scheduler = AnimationScheduler::new();
        let value = MotionValue::with_scheduler(scheduler.handle(), 0.0);

        let finished = value.animate_to(40.0, SpringConfig::snappy());
        assert!(value.is_animating());

        let mut now = 0.0;
        while scheduler.tick(now) {
            now += 16.0;
        }
        assert_eq!(value.get(), 40.0);
        assert_eq!(finished.value(), Some(40.0));
        assert!(!value.is_animating());
    }

    #[test]
    fn test_animate_to_retargets_in_flight() {
        let scheduler = AnimationScheduler::new();
        let value = MotionValue::with_scheduler(scheduler.handle(), 0.0);

        let first = value.animate_to(100.0, SpringOptions::default());
        scheduler.tick(0.0);
        scheduler.tick(16.0);
        let velocity = value.velocity();
        assert!(velocity > 0.0);

        let second = value.animate_to(-100.0, SpringOptions::default());
        assert!(first.ptr_eq(&second));
        assert_eq!(value.velocity(), velocity);
    }

    #[test]
    fn test_stop_and_set_cancel_animation() {
        let scheduler = AnimationScheduler::new();
        let value = MotionValue::with_scheduler(scheduler.handle(), 0.0);

        value.animate_to(100.0, SpringConfig::gentle());
        scheduler.tick(0.0);
        scheduler.tick(16.0);
        value.stop();
        assert!(!value.is_animating());
        assert!(!scheduler.is_ticking());

        let here = value.get();
        scheduler.tick(32.0);
        assert_eq!(value.get(), here);

        value.animate_to(100.0, SpringConfig::gentle());
        value.set(3.0);
        assert!(!value.is_animating());
        assert_eq!(value.get(), 3.0);
    }

    #[test]
    fn test_destroy_releases_driver() {
        let scheduler = AnimationScheduler::new();
        let source = MotionValue::with_scheduler(scheduler.handle(), 1.0);
        let value = MotionValue::with_scheduler(scheduler.handle(), 0.0);
        value.follow(source.clone());

        value.destroy();
        value.destroy();
        source.set(50.0);
        value.set(60.0);
        assert_eq!(value.get(), 1.0);
        assert!(value.subscribe(|_| {}).is_null());
        assert_eq!(source.inner.subscribers.len(), 0);
    }

    #[test]
    fn test_dropping_follower_unsubscribes() {
        let scheduler = AnimationScheduler::new();
        let source = MotionValue::with_scheduler(scheduler.handle(), 1.0);
        let value = MotionValue::with_scheduler(scheduler.handle(), 0.0);
        value.follow(source.clone());
        assert_eq!(source.inner.subscribers.len(), 1);

        drop(value);
        assert_eq!(source.inner.subscribers.len(), 0);
    }
}

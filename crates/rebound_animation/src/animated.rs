//! Spring-driven values
//!
//! [`AnimatedValue`] wraps a [`Spring`] in a small state machine and schedules
//! itself while it has work to do:
//!
//! ```text
//! Idle ──set/start──▶ Running ──settle──▶ Complete
//!                      │    ▲
//!                 pause│    │resume
//!                      ▼    │
//!                      Paused
//! ```
//!
//! `stop` and `jump` return to `Idle`. `destroy` is reachable from every state
//! and leaves the value permanently inert.
//!
//! The scheduler only holds a weak reference. Dropping the last clone of an
//! `AnimatedValue` while it runs removes it from the schedule on the next tick.

use std::sync::{Arc, Mutex};

use rebound_core::{
    call_isolated, lock, sanitize, Callback, SubscriptionId, Subscribers, ValueSource,
};
use slotmap::Key;

use crate::config::{SpringConfig, SpringHooks, SpringOptions, StartHook, ValueHook};
use crate::finished::Finished;
use crate::scheduler::{FrameInfo, SchedulerHandle, Tickable};
use crate::spring::Spring;

/// Lifecycle state of an [`AnimatedValue`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SpringState {
    #[default]
    Idle,
    Running,
    Paused,
    Complete,
}

struct SpringCore {
    spring: Spring,
    state: SpringState,
    /// Configuration new runs start from
    base_config: SpringConfig,
    base_hooks: SpringHooks,
    /// Hooks of the current run
    hooks: SpringHooks,
    finished: Finished,
    destroyed: bool,
}

impl SpringCore {
    /// Enter `Running` from rest, returning the hook to fire once unlocked.
    ///
    /// A signal already resolved by an earlier run is replaced; one left
    /// pending by `stop` or `jump` carries over to this run.
    fn start_run(&mut self) -> Option<StartHook> {
        if self.finished.is_resolved() {
            self.finished = Finished::pending();
        }
        self.state = SpringState::Running;
        self.hooks.on_start.clone()
    }
}

pub(crate) struct SpringCell {
    core: Mutex<SpringCore>,
    subscribers: Subscribers<f64>,
    scheduler: SchedulerHandle,
}

/// What a tick produced, dispatched once the core lock is released
struct TickOutcome {
    value: f64,
    changed: bool,
    on_update: Option<ValueHook>,
    settled: Option<(SpringHooks, Finished)>,
}

impl Tickable for SpringCell {
    fn update(&self, frame: &FrameInfo) {
        let outcome = {
            let mut core = lock(&self.core);
            if core.destroyed || core.state != SpringState::Running {
                return;
            }

            let before = core.spring.value();
            let settled = core.spring.step(frame.dt);
            let value = core.spring.value();

            let settled = if settled {
                core.state = SpringState::Complete;
                tracing::debug!("spring settled at {}", value);
                Some((core.hooks.clone(), core.finished.clone()))
            } else {
                None
            };

            TickOutcome {
                value,
                changed: value != before,
                on_update: core.hooks.on_update.clone(),
                settled,
            }
        };

        if outcome.changed {
            self.subscribers.notify(&outcome.value);
            if let Some(hook) = &outcome.on_update {
                call_isolated("on_update hook", || hook(outcome.value));
            }
        }

        if let Some((hooks, finished)) = outcome.settled {
            if let Some(hook) = &hooks.on_complete {
                call_isolated("on_complete hook", || hook(outcome.value));
            }
            if let Some(hook) = &hooks.on_rest {
                call_isolated("on_rest hook", || hook(outcome.value));
            }
            finished.resolve(outcome.value);
        }
    }

    fn is_complete(&self) -> bool {
        let core = lock(&self.core);
        core.destroyed || core.state != SpringState::Running
    }
}

/// A numeric value animated by a damped spring
///
/// Clones share the same spring.
///
/// ```rust
/// use rebound_animation::{AnimatedValue, AnimationScheduler, SpringConfig};
///
/// let scheduler = AnimationScheduler::new();
/// let value = AnimatedValue::new(scheduler.handle(), 0.0, SpringConfig::stiff());
///
/// value.set(100.0);
/// let mut now = 0.0;
/// while scheduler.tick(now) {
///     now += 16.0;
/// }
///
/// assert_eq!(value.get(), 100.0);
/// assert!(!value.is_animating());
/// ```
#[derive(Clone)]
pub struct AnimatedValue {
    cell: Arc<SpringCell>,
}

impl AnimatedValue {
    /// A value resting at `initial`.
    ///
    /// `options` supplies the base configuration (over the default preset)
    /// and the lifecycle hooks shared by every run.
    pub fn new(
        scheduler: SchedulerHandle,
        initial: f64,
        options: impl Into<SpringOptions>,
    ) -> Self {
        let options = options.into();
        let base_config = options.resolve(&SpringConfig::default());
        let base_hooks = options.hooks();
        let initial = sanitize(initial, "initial value");

        Self {
            cell: Arc::new(SpringCell {
                core: Mutex::new(SpringCore {
                    spring: Spring::new(base_config, initial),
                    state: SpringState::Idle,
                    base_config,
                    hooks: base_hooks.clone(),
                    base_hooks,
                    finished: Finished::pending(),
                    destroyed: false,
                }),
                subscribers: Subscribers::new(),
                scheduler,
            }),
        }
    }

    /// Current position
    pub fn get(&self) -> f64 {
        lock(&self.cell.core).spring.value()
    }

    pub fn velocity(&self) -> f64 {
        lock(&self.cell.core).spring.velocity()
    }

    pub fn target(&self) -> f64 {
        lock(&self.cell.core).spring.target()
    }

    pub fn state(&self) -> SpringState {
        lock(&self.cell.core).state
    }

    pub fn is_animating(&self) -> bool {
        lock(&self.cell.core).state == SpringState::Running
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.cell.core).destroyed
    }

    /// Configuration of the current run
    pub fn config(&self) -> SpringConfig {
        *lock(&self.cell.core).spring.config()
    }

    /// Animate toward `target` with the base configuration
    pub fn set(&self, target: f64) {
        self.set_with(target, SpringOptions::default());
    }

    /// Animate toward `target`, overriding configuration for this run.
    ///
    /// A running spring keeps its velocity so the motion stays continuous.
    /// A paused spring only takes the new target and remains paused.
    pub fn set_with(&self, target: f64, options: SpringOptions) {
        let target = sanitize(target, "target");

        let on_start = {
            let mut core = lock(&self.cell.core);
            if core.destroyed {
                return;
            }

            let state = core.state;
            let config = options.resolve(&core.base_config);
            core.spring.set_config(config);
            core.spring.set_target(target);
            if let Some(velocity) = options.velocity {
                core.spring.set_velocity(sanitize(velocity, "velocity"));
            }

            if matches!(state, SpringState::Running | SpringState::Paused) {
                // Hooks accumulate over the lifetime of a run
                core.hooks = core.hooks.overlay(&options);
                return;
            }
            core.hooks = core.base_hooks.overlay(&options);
            core.start_run()
        };

        self.begin_run(on_start);
    }

    /// Start moving toward the current target.
    ///
    /// Resumes a paused spring; no effect while running or complete.
    pub fn start(&self) {
        let on_start = {
            let mut core = lock(&self.cell.core);
            if core.destroyed {
                return;
            }
            let state = core.state;
            match state {
                SpringState::Idle => {}
                SpringState::Paused => {
                    core.state = SpringState::Running;
                    drop(core);
                    self.schedule();
                    return;
                }
                SpringState::Running | SpringState::Complete => return,
            }
            core.start_run()
        };

        self.begin_run(on_start);
    }

    /// Place the value at `value` immediately, cancelling any motion.
    ///
    /// Subscribers are notified before this returns. A pending
    /// [`finished`](Self::finished) signal stays pending.
    pub fn jump(&self, value: f64) {
        let value = sanitize(value, "jump value");
        {
            let mut core = lock(&self.cell.core);
            if core.destroyed {
                return;
            }
            core.spring.snap_to(value);
            core.state = SpringState::Idle;
        }

        self.unschedule();
        self.cell.subscribers.notify(&value);
    }

    /// Suspend a running spring, keeping position, velocity and target
    pub fn pause(&self) {
        {
            let mut core = lock(&self.cell.core);
            if core.destroyed || core.state != SpringState::Running {
                return;
            }
            core.state = SpringState::Paused;
        }
        self.unschedule();
    }

    pub fn resume(&self) {
        {
            let mut core = lock(&self.cell.core);
            if core.destroyed || core.state != SpringState::Paused {
                return;
            }
            core.state = SpringState::Running;
        }
        self.schedule();
    }

    /// Halt at the current position.
    ///
    /// Fires `on_rest` but not `on_complete`, and leaves
    /// [`finished`](Self::finished) unresolved.
    pub fn stop(&self) {
        let (value, on_rest) = {
            let mut core = lock(&self.cell.core);
            if core.destroyed
                || !matches!(core.state, SpringState::Running | SpringState::Paused)
            {
                return;
            }
            core.spring.halt();
            core.state = SpringState::Idle;
            (core.spring.value(), core.hooks.on_rest.clone())
        };

        self.unschedule();
        if let Some(hook) = on_rest {
            call_isolated("on_rest hook", || hook(value));
        }
    }

    /// Merge `options` into the base configuration and hooks.
    ///
    /// A run in progress picks up the change on its next step.
    pub fn set_config(&self, options: SpringOptions) {
        let mut core = lock(&self.cell.core);
        if core.destroyed {
            return;
        }

        core.base_config = options.resolve(&core.base_config);
        core.base_hooks = core.base_hooks.overlay(&options);
        core.hooks = core.hooks.overlay(&options);

        let active = options.resolve(core.spring.config());
        core.spring.set_config(active);
    }

    /// Completion signal of the current or next run
    pub fn finished(&self) -> Finished {
        lock(&self.cell.core).finished.clone()
    }

    /// Observe the value. `callback` is invoked immediately, then on every
    /// change while running and on `jump`.
    pub fn subscribe<F: Fn(f64) + Send + Sync + 'static>(&self, callback: F) -> SubscriptionId {
        self.subscribe_callback(Arc::new(move |value: &f64| callback(*value)))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.cell.subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.cell.subscribers.len()
    }

    /// Register a change callback without the initial invocation
    pub(crate) fn watch(&self, callback: Callback<f64>) -> SubscriptionId {
        if self.is_destroyed() {
            return SubscriptionId::default();
        }
        self.cell.subscribers.insert(callback)
    }

    /// Make the value permanently inert. Repeated calls have no effect.
    pub fn destroy(&self) {
        {
            let mut core = lock(&self.cell.core);
            if core.destroyed {
                return;
            }
            core.destroyed = true;
            core.spring.halt();
            core.state = SpringState::Idle;
        }

        self.unschedule();
        self.cell.subscribers.clear();
        tracing::debug!("animated value destroyed");
    }

    /// Whether both handles drive the same spring
    pub fn ptr_eq(&self, other: &AnimatedValue) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    fn begin_run(&self, on_start: Option<StartHook>) {
        tracing::debug!("spring run started toward {}", self.target());
        if let Some(hook) = on_start {
            call_isolated("on_start hook", || hook());
        }
        self.schedule();
    }

    fn schedule(&self) {
        if let Err(err) = self.cell.scheduler.register(&self.cell) {
            tracing::warn!("cannot animate value: {}", err);
            let mut core = lock(&self.cell.core);
            if core.state == SpringState::Running {
                core.spring.halt();
                core.state = SpringState::Idle;
            }
        }
    }

    fn unschedule(&self) {
        // A dropped scheduler holds nothing to remove
        let _ = self.cell.scheduler.unregister_unit(&self.cell);
    }
}

impl ValueSource for AnimatedValue {
    fn get(&self) -> f64 {
        AnimatedValue::get(self)
    }

    fn subscribe_callback(&self, callback: Callback<f64>) -> SubscriptionId {
        let id = self.watch(callback);
        if !id.is_null() {
            let value = self.get();
            self.cell.subscribers.notify_one(id, &value);
        }
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        AnimatedValue::unsubscribe(self, id)
    }
}

impl std::fmt::Debug for AnimatedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = lock(&self.cell.core);
        f.debug_struct("AnimatedValue")
            .field("value", &core.spring.value())
            .field("target", &core.spring.target())
            .field("velocity", &core.spring.velocity())
            .field("state", &core.state)
            .field("destroyed", &core.destroyed)
            .finish()
    }
}

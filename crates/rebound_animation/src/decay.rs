//! Inertial decay
//!
//! Continues a gesture's momentum after release. The value glides toward a
//! projected resting point with exponentially decaying velocity:
//!
//! ```text
//! amplitude = power * velocity
//! target    = origin + amplitude
//! x(t)      = target - amplitude * exp(-t / time_constant)
//! ```

use std::sync::{Arc, Mutex};

use rebound_core::{
    finite_or_zero, lock, sanitize, Callback, SubscriptionId, Subscribers, ValueSource,
};
use slotmap::Key;

use crate::finished::Finished;
use crate::scheduler::{FrameInfo, SchedulerHandle, Tickable};

/// Parameters of a decay
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecayConfig {
    /// Fraction of the release velocity (per second) turned into distance
    pub power: f64,
    /// Seconds for the remaining distance to shrink by a factor of e
    pub time_constant: f64,
    /// Remaining distance at which the value snaps to its resting point
    pub rest_delta: f64,
}

impl DecayConfig {
    pub const fn new(power: f64, time_constant: f64) -> Self {
        Self {
            power,
            time_constant,
            rest_delta: 0.5,
        }
    }

    pub const fn with_rest_delta(mut self, rest_delta: f64) -> Self {
        self.rest_delta = rest_delta;
        self
    }

    /// Where a decay released at `origin` with `velocity` comes to rest
    pub fn project(&self, origin: f64, velocity: f64) -> f64 {
        origin + self.power * velocity
    }

    fn sanitized(self) -> Self {
        let fallback = Self::default();
        let valid = |v: f64| v.is_finite() && v > 0.0;
        Self {
            power: if self.power.is_finite() && self.power >= 0.0 {
                self.power
            } else {
                fallback.power
            },
            time_constant: if valid(self.time_constant) {
                self.time_constant
            } else {
                fallback.time_constant
            },
            rest_delta: if valid(self.rest_delta) {
                self.rest_delta
            } else {
                fallback.rest_delta
            },
        }
    }
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self::new(0.8, 0.35)
    }
}

struct DecayCore {
    position: f64,
    target: f64,
    amplitude: f64,
    elapsed: f64,
    config: DecayConfig,
    running: bool,
    finished: Finished,
    destroyed: bool,
}

impl DecayCore {
    fn remaining(&self) -> f64 {
        self.amplitude * (-self.elapsed / self.config.time_constant).exp()
    }
}

struct DecayCell {
    core: Mutex<DecayCore>,
    subscribers: Subscribers<f64>,
    scheduler: SchedulerHandle,
}

impl Tickable for DecayCell {
    fn update(&self, frame: &FrameInfo) {
        let (value, changed, settled) = {
            let mut core = lock(&self.core);
            if core.destroyed || !core.running {
                return;
            }

            core.elapsed += frame.dt;
            let remaining = core.remaining();
            let before = core.position;

            let settled = remaining.abs() < core.config.rest_delta;
            core.position = if settled {
                core.running = false;
                core.target
            } else {
                core.target - remaining
            };

            let finished = settled.then(|| core.finished.clone());
            (core.position, core.position != before, finished)
        };

        if changed {
            self.subscribers.notify(&value);
        }
        if let Some(finished) = settled {
            tracing::debug!("decay came to rest at {}", value);
            finished.resolve(value);
        }
    }

    fn is_complete(&self) -> bool {
        let core = lock(&self.core);
        core.destroyed || !core.running
    }
}

/// A value coasting to rest after a fling
#[derive(Clone)]
pub struct DecayAnimation {
    cell: Arc<DecayCell>,
}

impl DecayAnimation {
    pub fn new(scheduler: SchedulerHandle, initial: f64) -> Self {
        Self {
            cell: Arc::new(DecayCell {
                core: Mutex::new(DecayCore {
                    position: sanitize(initial, "initial value"),
                    target: finite_or_zero(initial),
                    amplitude: 0.0,
                    elapsed: 0.0,
                    config: DecayConfig::default(),
                    running: false,
                    finished: Finished::pending(),
                    destroyed: false,
                }),
                subscribers: Subscribers::new(),
                scheduler,
            }),
        }
    }

    /// Coast from the current position with `velocity` (units per second)
    pub fn start(&self, velocity: f64, config: DecayConfig) -> Finished {
        let velocity = sanitize(velocity, "velocity");
        let config = config.sanitized();

        let finished = {
            let mut core = lock(&self.cell.core);
            if core.destroyed {
                return Finished::resolved(core.position);
            }
            if core.finished.is_resolved() {
                core.finished = Finished::pending();
            }
            core.amplitude = config.power * velocity;
            core.target = core.position + core.amplitude;
            core.elapsed = 0.0;
            core.config = config;
            core.running = true;
            core.finished.clone()
        };

        if let Err(err) = self.cell.scheduler.register(&self.cell) {
            tracing::warn!("cannot start decay: {}", err);
            let mut core = lock(&self.cell.core);
            core.running = false;
            core.target = core.position;
        }
        finished
    }

    /// Halt where the value is now. The pending signal stays unresolved.
    pub fn stop(&self) {
        {
            let mut core = lock(&self.cell.core);
            if !core.running {
                return;
            }
            core.running = false;
            core.target = core.position;
        }
        let _ = self.cell.scheduler.unregister_unit(&self.cell);
    }

    pub fn get(&self) -> f64 {
        lock(&self.cell.core).position
    }

    /// Projected resting point of the current decay
    pub fn target(&self) -> f64 {
        lock(&self.cell.core).target
    }

    /// Instantaneous velocity in units per second
    pub fn velocity(&self) -> f64 {
        let core = lock(&self.cell.core);
        if core.running {
            core.remaining() / core.config.time_constant
        } else {
            0.0
        }
    }

    pub fn is_animating(&self) -> bool {
        lock(&self.cell.core).running
    }

    pub fn finished(&self) -> Finished {
        lock(&self.cell.core).finished.clone()
    }

    pub fn subscribe<F: Fn(f64) + Send + Sync + 'static>(&self, callback: F) -> SubscriptionId {
        self.subscribe_callback(Arc::new(move |value: &f64| callback(*value)))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        !id.is_null() && self.cell.subscribers.remove(id)
    }

    pub fn destroy(&self) {
        {
            let mut core = lock(&self.cell.core);
            if core.destroyed {
                return;
            }
            core.destroyed = true;
            core.running = false;
        }
        let _ = self.cell.scheduler.unregister_unit(&self.cell);
        self.cell.subscribers.clear();
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.cell.core).destroyed
    }
}

impl ValueSource for DecayAnimation {
    fn get(&self) -> f64 {
        DecayAnimation::get(self)
    }

    fn subscribe_callback(&self, callback: Callback<f64>) -> SubscriptionId {
        if self.is_destroyed() {
            return SubscriptionId::default();
        }
        let id = self.cell.subscribers.insert(callback);
        self.cell.subscribers.notify_one(id, &self.get());
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        DecayAnimation::unsubscribe(self, id)
    }
}

impl std::fmt::Debug for DecayAnimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = lock(&self.cell.core);
        f.debug_struct("DecayAnimation")
            .field("position", &core.position)
            .field("target", &core.target)
            .field("running", &core.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::AnimationScheduler;

    fn run(scheduler: &AnimationScheduler) -> usize {
        let mut now = 0.0;
        let mut frames = 0;
        while scheduler.tick(now) {
            now += 16.0;
            frames += 1;
            assert!(frames < 10_000);
        }
        frames
    }

    #[test]
    fn test_coasts_to_projected_target() {
        let scheduler = AnimationScheduler::new();
        let decay = DecayAnimation::new(scheduler.handle(), 100.0);
        let config = DecayConfig::default();

        let finished = decay.start(1000.0, config);
        assert_eq!(decay.target(), config.project(100.0, 1000.0));
        assert!(decay.velocity() > 0.0);

        let mut previous = decay.get();
        let mut now = 0.0;
        while scheduler.tick(now) {
            now += 16.0;
            assert!(decay.get() >= previous);
            previous = decay.get();
        }

        assert_eq!(decay.get(), 900.0);
        assert_eq!(finished.value(), Some(900.0));
        assert!(!decay.is_animating());
    }

    #[test]
    fn test_zero_velocity_rests_immediately() {
        let scheduler = AnimationScheduler::new();
        let decay = DecayAnimation::new(scheduler.handle(), 5.0);

        let finished = decay.start(0.0, DecayConfig::default());
        assert_eq!(run(&scheduler), 1);
        assert_eq!(finished.value(), Some(5.0));
    }

    #[test]
    fn test_stop_leaves_signal_pending() {
        let scheduler = AnimationScheduler::new();
        let decay = DecayAnimation::new(scheduler.handle(), 0.0);

        let finished = decay.start(-2000.0, DecayConfig::new(0.5, 0.2));
        scheduler.tick(0.0);
        scheduler.tick(16.0);
        decay.stop();

        assert!(!scheduler.is_ticking());
        assert!(!finished.is_resolved());
        assert_eq!(decay.target(), decay.get());
        assert!(decay.get() < 0.0);
        assert_eq!(decay.velocity(), 0.0);
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let config = DecayConfig::new(f64::NAN, -1.0).with_rest_delta(0.0).sanitized();
        assert_eq!(config, DecayConfig::default());
    }
}

//! Damped spring integrator
//!
//! A one-dimensional mass-spring-damper:
//!
//! ```text
//! a = (stiffness * (target - position) - damping * velocity) / mass
//! ```
//!
//! Integration is semi-implicit Euler over fixed sub-steps of at most
//! [`MAX_SUBSTEP`] seconds, shortened to `1 / omega` for very stiff springs.
//! The damping term is solved implicitly within each sub-step, which keeps
//! heavily damped springs stable. Time that does not fill a whole sub-step is
//! carried into the next call, so the trajectory does not depend on how the
//! host slices frames.

use rebound_core::finite_or_zero;

use crate::config::SpringConfig;

/// Largest integration sub-step in seconds
pub const MAX_SUBSTEP: f64 = 0.001;

/// Upper bound on sub-steps per call; time beyond it is discarded
pub const MAX_SUBSTEPS_PER_CALL: usize = 100_000;

/// Absorbs float rounding when `dt` is an exact multiple of the sub-step
const STEP_EPSILON: f64 = 1e-9;

/// Position and velocity of the oscillator
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OscillatorState {
    pub position: f64,
    pub velocity: f64,
}

impl OscillatorState {
    pub const fn new(position: f64, velocity: f64) -> Self {
        Self { position, velocity }
    }

    pub const fn at_rest(position: f64) -> Self {
        Self::new(position, 0.0)
    }
}

/// Outcome of [`integrate`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepResult {
    pub state: OscillatorState,
    /// The spring met both rest thresholds; `state` is exactly the target
    pub settled: bool,
    /// Unconsumed time in seconds, to be added to the next call's `dt`
    pub remainder: f64,
}

/// Advance `state` toward `target` by `dt` seconds.
///
/// Non-finite position, velocity or target are treated as `0`. A
/// non-finite or negative `dt` advances nothing but still evaluates the rest
/// condition.
pub fn integrate(
    state: OscillatorState,
    target: f64,
    config: &SpringConfig,
    dt: f64,
) -> StepResult {
    let target = finite_or_zero(target);
    let mut position = finite_or_zero(state.position);
    let mut velocity = finite_or_zero(state.velocity);
    let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };

    if is_at_rest(position, velocity, target, config) {
        return settled(target);
    }

    let h = substep(config);
    let whole = (dt / h + STEP_EPSILON).floor();
    let steps = (whole as usize).min(MAX_SUBSTEPS_PER_CALL);
    let remainder = if steps < whole as usize {
        0.0
    } else {
        (dt - whole * h).max(0.0)
    };

    let inv_mass = 1.0 / config.mass;
    let damping_factor = 1.0 / (1.0 + h * config.damping * inv_mass);
    // Starting on the target, the side is the one the velocity leaves from
    let displacement = position - target;
    let side = if displacement != 0.0 {
        displacement.signum()
    } else {
        -velocity.signum()
    };

    for _ in 0..steps {
        let spring_force = config.stiffness * (target - position);
        velocity = (velocity + h * spring_force * inv_mass) * damping_factor;
        position += velocity * h;

        if config.clamp && (position - target).signum() != side {
            return settled(target);
        }
        if is_at_rest(position, velocity, target, config) {
            return settled(target);
        }
    }

    StepResult {
        state: OscillatorState::new(position, velocity),
        settled: false,
        remainder,
    }
}

/// Whether both rest thresholds are met
#[inline]
pub fn is_at_rest(position: f64, velocity: f64, target: f64, config: &SpringConfig) -> bool {
    velocity.abs() < config.rest_speed && (target - position).abs() < config.rest_delta
}

/// Sub-step length for a configuration
pub fn substep(config: &SpringConfig) -> f64 {
    let omega = config.natural_frequency();
    if omega.is_finite() && omega > 0.0 {
        MAX_SUBSTEP.min(1.0 / omega)
    } else {
        MAX_SUBSTEP
    }
}

fn settled(target: f64) -> StepResult {
    StepResult {
        state: OscillatorState::at_rest(target),
        settled: true,
        remainder: 0.0,
    }
}

/// A spring simulation: oscillator state, target and carried time
#[derive(Clone, Debug)]
pub struct Spring {
    config: SpringConfig,
    state: OscillatorState,
    target: f64,
    carry: f64,
    settled: bool,
}

impl Spring {
    /// A spring resting at `initial`
    pub fn new(config: SpringConfig, initial: f64) -> Self {
        let initial = finite_or_zero(initial);
        Self {
            config: config.sanitized(),
            state: OscillatorState::at_rest(initial),
            target: initial,
            carry: 0.0,
            settled: true,
        }
    }

    pub fn value(&self) -> f64 {
        self.state.position
    }

    pub fn velocity(&self) -> f64 {
        self.state.velocity
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn state(&self) -> OscillatorState {
        self.state
    }

    pub fn config(&self) -> &SpringConfig {
        &self.config
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Retarget without touching position or velocity
    pub fn set_target(&mut self, target: f64) {
        self.target = finite_or_zero(target);
        self.settled = false;
    }

    pub fn set_velocity(&mut self, velocity: f64) {
        self.state.velocity = finite_or_zero(velocity);
        self.settled = false;
    }

    /// Takes effect on the next step
    pub fn set_config(&mut self, config: SpringConfig) {
        self.config = config.sanitized();
    }

    /// Place the spring at rest on `value`
    pub fn snap_to(&mut self, value: f64) {
        let value = finite_or_zero(value);
        self.state = OscillatorState::at_rest(value);
        self.target = value;
        self.carry = 0.0;
        self.settled = true;
    }

    /// Freeze at the current position
    pub fn halt(&mut self) {
        let position = self.state.position;
        self.snap_to(position);
    }

    /// Advance by `dt` seconds, returning whether the spring has settled
    pub fn step(&mut self, dt: f64) -> bool {
        if self.settled {
            return true;
        }

        let result = integrate(self.state, self.target, &self.config, self.carry + dt);
        self.state = result.state;
        self.carry = result.remainder;
        self.settled = result.settled;
        if result.settled {
            self.target = result.state.position;
        }
        self.settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f64 = 1.0 / 60.0;

    fn run_to_rest(spring: &mut Spring, max_frames: usize) -> Option<usize> {
        (1..=max_frames).find(|_| spring.step(FRAME))
    }

    #[test]
    fn test_converges_exactly_on_target() {
        let configs = [
            SpringConfig::default(),
            SpringConfig::gentle(),
            SpringConfig::wobbly(),
            SpringConfig::stiff(),
            SpringConfig::molasses(),
            SpringConfig::new(1.0, 0.5),
            SpringConfig::new(10_000.0, 5.0).with_mass(0.2),
            SpringConfig::new(50.0, 400.0).with_mass(3.0),
        ];
        let cases = [(0.0, 100.0), (250.0, -40.0), (-1.0, 1.0), (0.0, 1e-3)];

        for config in configs {
            for (from, to) in cases {
                let mut spring = Spring::new(config, from);
                spring.set_target(to);
                let frames = run_to_rest(&mut spring, 60 * 600);
                assert!(frames.is_some(), "{:?} did not settle {} -> {}", config, from, to);
                assert_eq!(spring.value(), to);
                assert_eq!(spring.velocity(), 0.0);
            }
        }
    }

    #[test]
    fn test_frame_cadence_does_not_change_trajectory() {
        let config = SpringConfig::wobbly();
        let mut coarse = Spring::new(config, 0.0);
        let mut fine = Spring::new(config, 0.0);
        coarse.set_target(100.0);
        fine.set_target(100.0);

        for _ in 0..30 {
            coarse.step(0.032);
            for _ in 0..4 {
                fine.step(0.008);
            }
        }

        assert!((coarse.value() - fine.value()).abs() < 1e-9);
        assert!((coarse.velocity() - fine.velocity()).abs() < 1e-9);
    }

    #[test]
    fn test_fractional_time_accumulates() {
        let config = SpringConfig::default();
        let mut spring = Spring::new(config, 0.0);
        spring.set_target(10.0);

        // Less than one sub-step: nothing moves yet
        spring.step(MAX_SUBSTEP * 0.6);
        assert_eq!(spring.value(), 0.0);

        // Carried time completes a sub-step
        spring.step(MAX_SUBSTEP * 0.6);
        assert!(spring.value() > 0.0);
    }

    #[test]
    fn test_retarget_keeps_velocity() {
        let mut spring = Spring::new(SpringConfig::stiff(), 0.0);
        spring.set_target(100.0);
        for _ in 0..5 {
            spring.step(FRAME);
        }

        let position = spring.value();
        let velocity = spring.velocity();
        assert!(velocity > 0.0);

        spring.set_target(-100.0);
        assert_eq!(spring.velocity(), velocity);
        assert_eq!(spring.value(), position);

        // Next frame continues from the old motion; only acceleration flips
        spring.step(FRAME);
        let predicted = position + velocity * FRAME;
        let max_accel = (SpringConfig::stiff().stiffness * 200.0
            + SpringConfig::stiff().damping * velocity.abs())
            / SpringConfig::stiff().mass;
        assert!((spring.value() - predicted).abs() <= max_accel * FRAME * FRAME);
    }

    #[test]
    fn test_non_finite_inputs_fall_back_to_zero() {
        let config = SpringConfig::default();
        let result = integrate(
            OscillatorState::new(f64::NAN, f64::INFINITY),
            f64::NEG_INFINITY,
            &config,
            FRAME,
        );
        assert!(result.settled);
        assert_eq!(result.state, OscillatorState::at_rest(0.0));

        let mut spring = Spring::new(config, f64::NAN);
        assert_eq!(spring.value(), 0.0);
        spring.set_target(f64::NAN);
        assert!(spring.step(FRAME));
        assert_eq!(spring.value(), 0.0);
    }

    #[test]
    fn test_clamp_stops_at_target() {
        let config = SpringConfig::wobbly().with_clamp(true);
        let mut spring = Spring::new(config, 0.0);
        spring.set_target(100.0);

        let mut max_seen: f64 = 0.0;
        while !spring.step(FRAME) {
            max_seen = max_seen.max(spring.value());
        }
        assert!(max_seen <= 100.0);
        assert_eq!(spring.value(), 100.0);
    }

    #[test]
    fn test_clamp_on_target_with_velocity_does_not_overshoot() {
        let config = SpringConfig::wobbly().with_clamp(true);

        for velocity in [500.0, -500.0] {
            let mut spring = Spring::new(config, 0.0);
            spring.set_target(0.0);
            spring.set_velocity(velocity);

            let mut overshoot: f64 = 0.0;
            let mut frames = 0;
            while !spring.step(FRAME) {
                overshoot = overshoot.max(spring.value().abs());
                frames += 1;
                assert!(frames < 600);
            }
            assert_eq!(overshoot, 0.0);
            assert_eq!(spring.value(), 0.0);
            assert_eq!(spring.velocity(), 0.0);
        }
    }

    #[test]
    fn test_very_stiff_spring_is_stable() {
        let config = SpringConfig::new(1e8, 10.0);
        let mut spring = Spring::new(config, 0.0);
        spring.set_target(1.0);

        for _ in 0..10 {
            spring.step(FRAME);
            assert!(spring.value().is_finite());
            assert!(spring.value().abs() < 3.0);
        }
    }

    #[test]
    fn test_very_heavy_damping_is_stable() {
        let config = SpringConfig::new(100.0, 1e6);
        let mut spring = Spring::new(config, 0.0);
        spring.set_target(1.0);

        for _ in 0..10 {
            spring.step(FRAME);
            assert!(spring.value().is_finite());
            assert!(spring.value() >= 0.0 && spring.value() <= 1.0);
        }
    }

    #[test]
    fn test_loose_thresholds_settle_quickly() {
        let config = SpringConfig::new(1000.0, 50.0)
            .with_rest_speed(10.0)
            .with_rest_delta(10.0);
        let mut spring = Spring::new(config, 0.0);
        spring.set_target(25.0);

        let frames = run_to_rest(&mut spring, 120).expect("settles");
        assert!(frames <= 30, "took {} frames", frames);
        assert_eq!(spring.value(), 25.0);
    }

    #[test]
    fn test_halt_and_snap() {
        let mut spring = Spring::new(SpringConfig::default(), 0.0);
        spring.set_target(50.0);
        spring.step(FRAME);
        let here = spring.value();

        spring.halt();
        assert!(spring.is_settled());
        assert_eq!(spring.value(), here);
        assert_eq!(spring.target(), here);
        assert_eq!(spring.velocity(), 0.0);

        spring.snap_to(7.0);
        assert_eq!(spring.value(), 7.0);
        assert!(spring.step(FRAME));
    }
}

//! Spring configuration
//!
//! [`SpringConfig`] holds the physical parameters of a spring. [`SpringOptions`]
//! is the layered override accepted by value constructors and by every
//! `set_with` call: each field is optional and, when present, replaces the
//! corresponding field of the base configuration. Overrides are resolved once
//! per call and never mutate shared presets.

use std::fmt;
use std::sync::Arc;

use rebound_core::{Error, Result};

/// Velocity magnitude below which a spring may settle
pub const DEFAULT_REST_SPEED: f64 = 0.01;

/// Distance from target below which a spring may settle
pub const DEFAULT_REST_DELTA: f64 = 0.01;

/// Physical parameters of a damped spring
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringConfig {
    /// Spring constant, must be > 0
    pub stiffness: f64,
    /// Velocity-proportional friction, must be >= 0
    pub damping: f64,
    /// Mass of the moving body, must be > 0
    pub mass: f64,
    /// Settling velocity threshold
    pub rest_speed: f64,
    /// Settling displacement threshold
    pub rest_delta: f64,
    /// Settle as soon as the target is crossed instead of overshooting
    pub clamp: bool,
}

impl SpringConfig {
    pub const fn new(stiffness: f64, damping: f64) -> Self {
        Self {
            stiffness,
            damping,
            mass: 1.0,
            rest_speed: DEFAULT_REST_SPEED,
            rest_delta: DEFAULT_REST_DELTA,
            clamp: false,
        }
    }

    // ========================================================================
    // Presets
    // ========================================================================

    /// Soft, slightly slow settle
    pub const fn gentle() -> Self {
        Self::new(120.0, 14.0)
    }

    /// Visible overshoot and bounce
    pub const fn wobbly() -> Self {
        Self::new(180.0, 12.0)
    }

    /// Quick with minimal overshoot
    pub const fn stiff() -> Self {
        Self::new(210.0, 20.0)
    }

    /// Fast, UI-feedback style response
    pub const fn snappy() -> Self {
        Self::new(400.0, 30.0)
    }

    /// Heavily damped, slow approach
    pub const fn slow() -> Self {
        Self::new(280.0, 60.0)
    }

    /// Very heavily damped
    pub const fn molasses() -> Self {
        Self::new(280.0, 120.0)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub const fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub const fn with_rest_speed(mut self, rest_speed: f64) -> Self {
        self.rest_speed = rest_speed;
        self
    }

    pub const fn with_rest_delta(mut self, rest_delta: f64) -> Self {
        self.rest_delta = rest_delta;
        self
    }

    pub const fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    /// Damping ratio relative to critical damping (1.0 = critical)
    pub fn damping_ratio(&self) -> f64 {
        self.damping / (2.0 * (self.stiffness * self.mass).sqrt())
    }

    /// Undamped angular frequency in radians per second
    pub fn natural_frequency(&self) -> f64 {
        (self.stiffness / self.mass).sqrt()
    }

    /// Check every field against its domain
    pub fn validate(&self) -> Result<()> {
        check("stiffness", self.stiffness, |v| v > 0.0)?;
        check("damping", self.damping, |v| v >= 0.0)?;
        check("mass", self.mass, |v| v > 0.0)?;
        check("rest_speed", self.rest_speed, |v| v >= 0.0)?;
        check("rest_delta", self.rest_delta, |v| v >= 0.0)?;
        Ok(())
    }

    /// Replace every invalid field with the default preset's value
    pub fn sanitized(self) -> Self {
        if self.validate().is_ok() {
            return self;
        }

        let fallback = Self::default();
        Self {
            stiffness: field_or("stiffness", self.stiffness, fallback.stiffness, |v| v > 0.0),
            damping: field_or("damping", self.damping, fallback.damping, |v| v >= 0.0),
            mass: field_or("mass", self.mass, fallback.mass, |v| v > 0.0),
            rest_speed: field_or("rest_speed", self.rest_speed, fallback.rest_speed, |v| {
                v >= 0.0
            }),
            rest_delta: field_or("rest_delta", self.rest_delta, fallback.rest_delta, |v| {
                v >= 0.0
            }),
            clamp: self.clamp,
        }
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self::new(170.0, 26.0)
    }
}

fn check(field: &'static str, value: f64, valid: fn(f64) -> bool) -> Result<()> {
    if value.is_finite() && valid(value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig { field, value })
    }
}

fn field_or(field: &'static str, value: f64, fallback: f64, valid: fn(f64) -> bool) -> f64 {
    match check(field, value, valid) {
        Ok(()) => value,
        Err(err) => {
            tracing::warn!("{}; using {}", err, fallback);
            fallback
        }
    }
}

// ============================================================================
// Layered overrides
// ============================================================================

/// Callback receiving the spring's value
pub type ValueHook = Arc<dyn Fn(f64) + Send + Sync>;

/// Callback without arguments
pub type StartHook = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle callbacks attached to a spring run
#[derive(Clone, Default)]
pub struct SpringHooks {
    /// Every value change while running
    pub on_update: Option<ValueHook>,
    /// A run begins from rest
    pub on_start: Option<StartHook>,
    /// The spring settled at its target
    pub on_complete: Option<ValueHook>,
    /// The run ended, by settling or by `stop()`
    pub on_rest: Option<ValueHook>,
}

impl SpringHooks {
    /// Hooks from `options` replace the ones in `self` field by field
    pub fn overlay(&self, options: &SpringOptions) -> SpringHooks {
        SpringHooks {
            on_update: options.on_update.clone().or_else(|| self.on_update.clone()),
            on_start: options.on_start.clone().or_else(|| self.on_start.clone()),
            on_complete: options
                .on_complete
                .clone()
                .or_else(|| self.on_complete.clone()),
            on_rest: options.on_rest.clone().or_else(|| self.on_rest.clone()),
        }
    }
}

impl fmt::Debug for SpringHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpringHooks")
            .field("on_update", &self.on_update.is_some())
            .field("on_start", &self.on_start.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_rest", &self.on_rest.is_some())
            .finish()
    }
}

/// Per-call configuration override
///
/// ```rust
/// use rebound_animation::{SpringConfig, SpringOptions};
///
/// let base = SpringConfig::gentle();
/// let resolved = SpringOptions::new().stiffness(500.0).resolve(&base);
///
/// assert_eq!(resolved.stiffness, 500.0);
/// assert_eq!(resolved.damping, base.damping);
/// ```
#[derive(Clone, Default)]
pub struct SpringOptions {
    pub stiffness: Option<f64>,
    pub damping: Option<f64>,
    pub mass: Option<f64>,
    pub rest_speed: Option<f64>,
    pub rest_delta: Option<f64>,
    pub clamp: Option<bool>,
    /// Velocity injected when the call takes effect
    pub velocity: Option<f64>,
    pub on_update: Option<ValueHook>,
    pub on_start: Option<StartHook>,
    pub on_complete: Option<ValueHook>,
    pub on_rest: Option<ValueHook>,
}

impl SpringOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = Some(stiffness);
        self
    }

    pub fn damping(mut self, damping: f64) -> Self {
        self.damping = Some(damping);
        self
    }

    pub fn mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn rest_speed(mut self, rest_speed: f64) -> Self {
        self.rest_speed = Some(rest_speed);
        self
    }

    pub fn rest_delta(mut self, rest_delta: f64) -> Self {
        self.rest_delta = Some(rest_delta);
        self
    }

    pub fn clamp(mut self, clamp: bool) -> Self {
        self.clamp = Some(clamp);
        self
    }

    pub fn velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn on_update<F: Fn(f64) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    pub fn on_start<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_start = Some(Arc::new(f));
        self
    }

    pub fn on_complete<F: Fn(f64) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }

    pub fn on_rest<F: Fn(f64) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_rest = Some(Arc::new(f));
        self
    }

    /// Apply the physical overrides on top of `base`.
    ///
    /// Invalid values fall back to the default preset, see
    /// [`SpringConfig::sanitized`].
    pub fn resolve(&self, base: &SpringConfig) -> SpringConfig {
        SpringConfig {
            stiffness: self.stiffness.unwrap_or(base.stiffness),
            damping: self.damping.unwrap_or(base.damping),
            mass: self.mass.unwrap_or(base.mass),
            rest_speed: self.rest_speed.unwrap_or(base.rest_speed),
            rest_delta: self.rest_delta.unwrap_or(base.rest_delta),
            clamp: self.clamp.unwrap_or(base.clamp),
        }
        .sanitized()
    }

    /// The lifecycle callbacks carried by these options
    pub fn hooks(&self) -> SpringHooks {
        SpringHooks::default().overlay(self)
    }

    /// Whether any physical parameter is overridden
    pub fn has_physics(&self) -> bool {
        self.stiffness.is_some()
            || self.damping.is_some()
            || self.mass.is_some()
            || self.rest_speed.is_some()
            || self.rest_delta.is_some()
            || self.clamp.is_some()
    }
}

impl From<SpringConfig> for SpringOptions {
    fn from(config: SpringConfig) -> Self {
        Self {
            stiffness: Some(config.stiffness),
            damping: Some(config.damping),
            mass: Some(config.mass),
            rest_speed: Some(config.rest_speed),
            rest_delta: Some(config.rest_delta),
            clamp: Some(config.clamp),
            ..Self::default()
        }
    }
}

impl fmt::Debug for SpringOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpringOptions")
            .field("stiffness", &self.stiffness)
            .field("damping", &self.damping)
            .field("mass", &self.mass)
            .field("rest_speed", &self.rest_speed)
            .field("rest_delta", &self.rest_delta)
            .field("clamp", &self.clamp)
            .field("velocity", &self.velocity)
            .field("hooks", &self.hooks())
            .finish()
    }
}

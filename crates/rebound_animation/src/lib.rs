//! Rebound Animation System
//!
//! Physically based spring animation driven by a shared frame scheduler.
//!
//! # Features
//!
//! - **Spring Physics**: Sub-stepped semi-implicit Euler with fractional time
//!   carry, stable for very stiff and very heavily damped springs
//! - **Scheduler**: Weakly held tickable units, clamped frame deltas, no cost
//!   while idle
//! - **Animated Values**: Interruptible springs that keep their velocity when
//!   retargeted, with awaitable completion
//! - **Groups**: Named channels animated together with coalesced notifications
//! - **Derived Values**: Mapping, combining and range-mapping of any value
//!   source
//!
//! # Example
//!
//! ```rust
//! use rebound_animation::{AnimatedValue, AnimationScheduler, SpringOptions};
//!
//! let scheduler = AnimationScheduler::new();
//! let options = SpringOptions::new().stiffness(1000.0).damping(100.0);
//! let opacity = AnimatedValue::new(scheduler.handle(), 0.0, options);
//!
//! let finished = opacity.finished();
//! opacity.set(1.0);
//!
//! let mut now = 0.0;
//! while scheduler.tick(now) {
//!     now += 16.0;
//! }
//!
//! assert_eq!(pollster::block_on(finished), 1.0);
//! ```

pub mod animated;
pub mod config;
pub mod decay;
pub mod derived;
pub mod easing;
pub mod finished;
pub mod group;
pub mod motion;
pub mod scheduler;
pub mod spring;
pub mod ticker;
pub mod transform;

pub use animated::{AnimatedValue, SpringState};
pub use config::{SpringConfig, SpringHooks, SpringOptions};
pub use decay::{DecayAnimation, DecayConfig};
pub use derived::Derived;
pub use easing::Easing;
pub use finished::{Finished, GroupFinished};
pub use group::{AnimatedGroup, ChannelKey};
pub use motion::MotionValue;
pub use scheduler::{
    default_scheduler, global_scheduler, set_global_scheduler, AnimationScheduler, FrameInfo,
    FrameListenerId, SchedulerHandle, TickSource, Tickable, UnitId, MAX_DT,
};
pub use spring::{OscillatorState, Spring};
pub use ticker::BackgroundTicker;
pub use transform::{rubber_band, rubber_band_clamp, RangeMap, RUBBER_BAND_CONSTANT};

pub use rebound_core::{Error, Result, SubscriptionId, ValueSource};

/// Create a spring on the global scheduler
pub fn create_spring(initial: f64, options: impl Into<SpringOptions>) -> AnimatedValue {
    AnimatedValue::new(global_scheduler(), initial, options)
}

/// Create a spring group on the global scheduler
pub fn create_spring_group<K: ChannelKey>(
    initial: impl IntoIterator<Item = (K, f64)>,
    options: impl Into<SpringOptions>,
) -> AnimatedGroup<K> {
    AnimatedGroup::new(global_scheduler(), initial, options)
}

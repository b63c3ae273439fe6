//! Range mapping and elastic overscroll
//!
//! [`RangeMap`] maps an input range onto an output range, piecewise-linear
//! across any number of stops, with optional clamping at the ends and an
//! optional easing curve applied inside each segment.

use rebound_core::{finite_or_zero, Error, Result};
use smallvec::SmallVec;

use crate::easing::Easing;

/// Resistance used by iOS-style overscroll
pub const RUBBER_BAND_CONSTANT: f64 = 0.55;

type Stops = SmallVec<[f64; 4]>;

/// Piecewise mapping from input stops to output stops
///
/// ```rust
/// use rebound_animation::RangeMap;
///
/// let opacity = RangeMap::new([0.0, 100.0], [1.0, 0.0]).unwrap().clamp(true);
/// assert_eq!(opacity.apply(50.0), 0.5);
/// assert_eq!(opacity.apply(250.0), 0.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RangeMap {
    input: Stops,
    output: Stops,
    clamp: bool,
    easing: Easing,
}

impl RangeMap {
    /// Build a mapping from matching input and output stops.
    ///
    /// Input stops must be monotonic; a descending input is accepted and
    /// stored in ascending order.
    pub fn new(
        input: impl IntoIterator<Item = f64>,
        output: impl IntoIterator<Item = f64>,
    ) -> Result<Self> {
        let mut input: Stops = input.into_iter().collect();
        let mut output: Stops = output.into_iter().collect();

        if input.len() < 2 {
            return Err(Error::InvalidRange(format!(
                "need at least two input stops, got {}",
                input.len()
            )));
        }
        if input.len() != output.len() {
            return Err(Error::InvalidRange(format!(
                "{} input stops but {} output stops",
                input.len(),
                output.len()
            )));
        }
        if input.iter().chain(output.iter()).any(|v| !v.is_finite()) {
            return Err(Error::InvalidRange("stops must be finite".into()));
        }

        if input[0] > input[input.len() - 1] {
            input.reverse();
            output.reverse();
        }
        if input.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(Error::InvalidRange("input stops must be monotonic".into()));
        }

        Ok(Self {
            input,
            output,
            clamp: false,
            easing: Easing::Linear,
        })
    }

    /// Hold the first and last output outside the input range
    pub fn clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    /// Ease the interpolation parameter of every segment
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn is_clamped(&self) -> bool {
        self.clamp
    }

    /// Map `x`. Without clamping, values outside the input range extrapolate
    /// linearly from the nearest segment.
    pub fn apply(&self, x: f64) -> f64 {
        let x = finite_or_zero(x);
        let last = self.input.len() - 1;

        let segment = self.input[1..last]
            .iter()
            .position(|&stop| x < stop)
            .unwrap_or(last - 1);

        let (in_start, in_end) = (self.input[segment], self.input[segment + 1]);
        let (out_start, out_end) = (self.output[segment], self.output[segment + 1]);

        let span = in_end - in_start;
        if span == 0.0 {
            return if x < in_start { out_start } else { out_end };
        }

        let mut t = (x - in_start) / span;
        if self.clamp {
            t = t.clamp(0.0, 1.0);
        }
        let eased = if (0.0..=1.0).contains(&t) {
            self.easing.apply(t)
        } else {
            t
        };

        out_start + (out_end - out_start) * eased
    }
}

/// Elastic resistance for `overshoot` past an edge.
///
/// Grows without bound but ever more slowly, approaching `dimension`.
pub fn rubber_band(overshoot: f64, dimension: f64, constant: f64) -> f64 {
    let overshoot = finite_or_zero(overshoot);
    if dimension <= 0.0 || !dimension.is_finite() || overshoot == 0.0 {
        return 0.0;
    }
    let resisted = (1.0 - 1.0 / (overshoot.abs() * constant / dimension + 1.0)) * dimension;
    resisted.copysign(overshoot)
}

/// Pass `value` through inside `min..=max`, applying [`rubber_band`] beyond
pub fn rubber_band_clamp(value: f64, min: f64, max: f64, dimension: f64, constant: f64) -> f64 {
    let value = finite_or_zero(value);
    if value < min {
        min - rubber_band(min - value, dimension, constant)
    } else if value > max {
        max + rubber_band(value - max, dimension, constant)
    } else {
        value
    }
}

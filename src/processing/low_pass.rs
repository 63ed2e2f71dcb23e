//! Exponential low-pass filters for sensor channels

use nalgebra::Vector3;
use std::f64::consts::TAU;

/// First-order low-pass filter over 3-axis samples.
///
/// `weight` is the share given to each new sample; 1.0 disables smoothing.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    weight: f64,
    value: Option<Vector3<f64>>,
}

impl LowPassFilter {
    pub fn new(weight: f64) -> Self {
        Self {
            weight: weight.clamp(0.0, 1.0),
            value: None,
        }
    }

    pub fn update(&mut self, sample: Vector3<f64>) -> Vector3<f64> {
        let next = match self.value {
            Some(prev) => prev + (sample - prev) * self.weight,
            None => sample,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<Vector3<f64>> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Low-pass filter for angles, smoothing in the cos/sin domain so that
/// readings either side of north average correctly.
#[derive(Debug, Clone)]
pub struct CircularLowPassFilter {
    weight: f64,
    state: Option<(f64, f64)>,
}

impl CircularLowPassFilter {
    pub fn new(weight: f64) -> Self {
        Self {
            weight: weight.clamp(0.0, 1.0),
            state: None,
        }
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight.clamp(0.0, 1.0);
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Feed an angle in radians, returning the smoothed angle in [0, 2π)
    pub fn update(&mut self, angle: f64) -> f64 {
        let (c, s) = (angle.cos(), angle.sin());
        let (c, s) = match self.state {
            Some((pc, ps)) => (pc + (c - pc) * self.weight, ps + (s - ps) * self.weight),
            None => (c, s),
        };
        self.state = Some((c, s));
        normalize_angle(s.atan2(c))
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

/// Wrap an angle into [0, 2π)
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

//! Estimation constants and thresholds

/// Minimum overlap confidence for a match to count as a floor-detection hit
pub const FLOOR_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Hits a floor needs before it is selected
pub const FLOOR_HIT_TARGET: usize = 5;

/// Assumed spread of a single access point level (dB)
pub const LEVEL_SIGMA_DBM: f64 = 5.0;

/// Tolerance for histogram fractions summing to one
pub const HISTOGRAM_EPSILON: f64 = 1e-6;

//! Random sources for the Monte-Carlo estimators
//!
//! Estimators take a boxed [`NoiseSource`] so tests can make them
//! deterministic.

use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, StandardNormal, Uniform};

pub trait NoiseSource: Send {
    /// Zero-mean Gaussian sample with the given standard deviation
    fn gaussian(&mut self, stddev: f64) -> f64;

    /// Uniform sample in [0, 1)
    fn uniform(&mut self) -> f64;
}

/// Seeded pseudo-random noise
#[derive(Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    /// A seed of 0 draws from entropy
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }
}

impl NoiseSource for NoiseGenerator {
    #[inline]
    fn gaussian(&mut self, stddev: f64) -> f64 {
        if stddev == 0.0 {
            return 0.0;
        }
        let n: f64 = self.rng.sample(StandardNormal);
        n * stddev
    }

    #[inline]
    fn uniform(&mut self) -> f64 {
        Uniform::new(0.0f64, 1.0).sample(&mut self.rng)
    }
}

/// Noise source that never perturbs anything.
///
/// Uniform draws walk a fixed low-discrepancy sequence so resampling still
/// visits every weight bucket.
#[derive(Debug, Clone, Default)]
pub struct ZeroNoise {
    counter: u64,
}

impl NoiseSource for ZeroNoise {
    fn gaussian(&mut self, _stddev: f64) -> f64 {
        0.0
    }

    fn uniform(&mut self) -> f64 {
        // golden-ratio sequence
        self.counter = self.counter.wrapping_add(1);
        (self.counter as f64 * 0.618_033_988_749_895).fract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_seed() {
        let mut a = NoiseGenerator::new(42);
        let mut b = NoiseGenerator::new(42);
        for _ in 0..50 {
            assert_eq!(a.gaussian(1.0), b.gaussian(1.0));
            assert_eq!(a.uniform(), b.uniform());
        }
    }

    #[test]
    fn test_zero_stddev() {
        let mut noise = NoiseGenerator::new(7);
        assert_eq!(noise.gaussian(0.0), 0.0);
    }

    #[test]
    fn test_zero_noise_uniform_in_range() {
        let mut noise = ZeroNoise::default();
        for _ in 0..100 {
            let u = noise.uniform();
            assert!((0.0..1.0).contains(&u));
        }
        assert_eq!(noise.gaussian(5.0), 0.0);
    }
}

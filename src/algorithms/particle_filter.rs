//! Monte-Carlo position estimator
//!
//! Dead-reckoning deltas move the cloud (prediction), WiFi estimates
//! reweight it (correction). Distances in the configuration are meters and
//! are converted with the map scale.

use serde::{Deserialize, Serialize};

use super::noise::{NoiseGenerator, NoiseSource};
use crate::core::Point2D;

/// A single position hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleFilterConfig {
    /// Number of particles
    pub num_particles: usize,
    /// Standard deviation of the initial scatter (meters)
    pub initial_spread_m: f64,
    /// Standard deviation of per-particle motion noise (meters)
    pub process_noise_m: f64,
    /// Width of the Gaussian observation likelihood (meters)
    pub sensor_sigma_m: f64,
    /// Random seed (0 for entropy)
    pub seed: u64,
}

impl Default for ParticleFilterConfig {
    fn default() -> Self {
        Self {
            num_particles: 500,
            initial_spread_m: 2.0,
            process_noise_m: 0.5,
            sensor_sigma_m: 3.0,
            seed: 0,
        }
    }
}

pub struct ParticleFilter {
    config: ParticleFilterConfig,
    particles: Vec<Particle>,
    /// Map units per meter
    scale: f64,
    initialized: bool,
    noise: Box<dyn NoiseSource>,
}

impl std::fmt::Debug for ParticleFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleFilter")
            .field("config", &self.config)
            .field("particles", &self.particles.len())
            .field("scale", &self.scale)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl ParticleFilter {
    pub fn new(config: ParticleFilterConfig, scale: f64) -> Self {
        let noise = Box::new(NoiseGenerator::new(config.seed));
        Self::with_noise(config, scale, noise)
    }

    pub fn with_noise(config: ParticleFilterConfig, scale: f64, noise: Box<dyn NoiseSource>) -> Self {
        Self {
            config,
            particles: Vec::new(),
            scale,
            initialized: false,
            noise,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn config(&self) -> &ParticleFilterConfig {
        &self.config
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    /// Forget the cloud; the next [`initialize`](Self::initialize) starts over
    pub fn reset(&mut self) {
        self.particles.clear();
        self.initialized = false;
    }

    /// Scatter the cloud around a seed position
    pub fn initialize(&mut self, x0: f64, y0: f64) {
        let n = self.config.num_particles;
        let spread = self.config.initial_spread_m * self.scale;
        let weight = if n > 0 { 1.0 / n as f64 } else { 0.0 };

        self.particles = (0..n)
            .map(|_| Particle {
                x: x0 + self.noise.gaussian(spread),
                y: y0 + self.noise.gaussian(spread),
                weight,
            })
            .collect();
        self.initialized = true;
        log::debug!("Particle filter initialized with {} particles at ({:.2}, {:.2})", n, x0, y0);
    }

    /// Prediction: move every particle by the delta plus process noise
    pub fn update_action(&mut self, dx: f64, dy: f64) {
        let sigma = self.config.process_noise_m * self.scale;
        for particle in &mut self.particles {
            particle.x += dx + self.noise.gaussian(sigma);
            particle.y += dy + self.noise.gaussian(sigma);
        }
    }

    /// Correction: weight particles by closeness to the observed point.
    ///
    /// Returns false when no particle explains the observation; the weights
    /// are left untouched in that case.
    pub fn update_sensor(&mut self, x: f64, y: f64) -> bool {
        if self.particles.is_empty() {
            return false;
        }
        let sigma = (self.config.sensor_sigma_m * self.scale).max(f64::EPSILON);
        let two_sigma_sq = 2.0 * sigma * sigma;

        let weights: Vec<f64> = self
            .particles
            .iter()
            .map(|p| {
                let d_sq = (p.x - x).powi(2) + (p.y - y).powi(2);
                (-d_sq / two_sigma_sq).exp()
            })
            .collect();
        let total: f64 = weights.iter().sum();

        if total <= 0.0 || !total.is_finite() {
            log::warn!("All particles have zero likelihood, keeping current weights");
            return false;
        }
        for (particle, w) in self.particles.iter_mut().zip(weights) {
            particle.weight = w / total;
        }
        true
    }

    /// Multinomial resampling; weights become uniform afterwards
    pub fn resampling(&mut self) {
        let n = self.particles.len();
        if n == 0 {
            return;
        }

        let mut cumulative = Vec::with_capacity(n);
        let mut sum = 0.0;
        for p in &self.particles {
            sum += p.weight;
            cumulative.push(sum);
        }
        if sum <= 0.0 || !sum.is_finite() {
            return;
        }

        let uniform_weight = 1.0 / n as f64;
        let resampled: Vec<Particle> = (0..n)
            .map(|_| {
                let r = self.noise.uniform() * sum;
                let idx = cumulative.partition_point(|&c| c <= r).min(n - 1);
                Particle {
                    weight: uniform_weight,
                    ..self.particles[idx]
                }
            })
            .collect();
        self.particles = resampled;
    }

    /// Weighted mean of the cloud
    pub fn calculate_position(&self) -> Option<Point2D> {
        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        if self.particles.is_empty() || total <= 0.0 {
            return None;
        }
        let (x, y) = self
            .particles
            .iter()
            .fold((0.0, 0.0), |(x, y), p| (x + p.x * p.weight, y + p.y * p.weight));
        Some(Point2D::new(x / total, y / total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::noise::ZeroNoise;
    use approx::assert_abs_diff_eq;

    fn config(num_particles: usize) -> ParticleFilterConfig {
        ParticleFilterConfig {
            num_particles,
            seed: 11,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_noise_initialize_returns_seed() {
        let mut pf = ParticleFilter::with_noise(config(100), 1.0, Box::new(ZeroNoise::default()));
        pf.initialize(12.5, -3.0);

        let p = pf.calculate_position().unwrap();
        assert_abs_diff_eq!(p.x, 12.5, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, -3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uninitialized_has_no_position() {
        let pf = ParticleFilter::new(config(100), 1.0);
        assert!(!pf.is_initialized());
        assert_eq!(pf.calculate_position(), None);
    }

    #[test]
    fn test_zero_particles_is_noop() {
        let mut pf = ParticleFilter::new(config(0), 1.0);
        pf.initialize(1.0, 1.0);
        pf.update_action(1.0, 1.0);
        assert!(!pf.update_sensor(5.0, 5.0));
        pf.resampling();
        assert_eq!(pf.calculate_position(), None);
    }

    #[test]
    fn test_action_moves_cloud() {
        let mut pf = ParticleFilter::with_noise(config(50), 1.0, Box::new(ZeroNoise::default()));
        pf.initialize(0.0, 0.0);
        pf.update_action(2.0, -1.0);

        let p = pf.calculate_position().unwrap();
        assert_abs_diff_eq!(p.x, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sensor_weights_normalized_and_pull_estimate() {
        let mut pf = ParticleFilter::new(config(500), 1.0);
        pf.initialize(0.0, 0.0);
        assert!(pf.update_sensor(3.0, 0.0));

        let total: f64 = pf.particles().iter().map(|p| p.weight).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        assert!(pf.calculate_position().unwrap().x > 0.0);
    }

    #[test]
    fn test_resampling_resets_weights() {
        let mut pf = ParticleFilter::new(config(200), 1.0);
        pf.initialize(0.0, 0.0);
        pf.update_sensor(1.0, 1.0);
        pf.resampling();

        assert_eq!(pf.particles().len(), 200);
        for p in pf.particles() {
            assert_abs_diff_eq!(p.weight, 1.0 / 200.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_resampling_favours_heavy_particles() {
        let mut pf = ParticleFilter::with_noise(config(4), 1.0, Box::new(ZeroNoise::default()));
        pf.initialize(0.0, 0.0);
        pf.particles = vec![
            Particle { x: 0.0, y: 0.0, weight: 0.0 },
            Particle { x: 10.0, y: 0.0, weight: 1.0 },
            Particle { x: 0.0, y: 0.0, weight: 0.0 },
            Particle { x: 0.0, y: 0.0, weight: 0.0 },
        ];
        pf.resampling();
        assert!(pf.particles().iter().all(|p| p.x == 10.0));
    }

    #[test]
    fn test_far_observation_keeps_weights() {
        let mut pf = ParticleFilter::with_noise(config(10), 1.0, Box::new(ZeroNoise::default()));
        pf.initialize(0.0, 0.0);
        assert!(!pf.update_sensor(1.0e6, 1.0e6));
        let p = pf.calculate_position().unwrap();
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-9);
    }
}

//! Position estimation algorithms

pub mod noise;
pub mod particle_filter;
pub mod dead_reckoning;
pub mod map_matching;

pub use noise::{NoiseGenerator, NoiseSource, ZeroNoise};
pub use particle_filter::{Particle, ParticleFilter, ParticleFilterConfig};
pub use dead_reckoning::{DeadReckoningConfig, DeadReckoningEstimator};
pub use map_matching::{match_point, snap, MapMatchingMode};

//! Common API types and data structures

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algorithms::particle_filter::Particle;
use crate::core::{Edge, FloorId, Fingerprint, ScoredPoint};
use crate::hardware::SensorError;
use crate::utils::config::ConfigError;

/// Result type for locator operations
pub type LocatorResult<T> = Result<T, LocatorError>;

/// Locator error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocatorError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Sensor platform or scanner failure
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),
    /// Floor not present in the loaded map data
    #[error("Unknown floor {0}")]
    UnknownFloor(FloorId),
    /// Worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    Thread(String),
}

/// Source of the published position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalizationMode {
    /// WiFi corrections and dead-reckoning predictions fused by particles
    ParticleFilter,
    /// Each WiFi estimate replaces the position
    Wifi,
    /// Dead-reckoning deltas only
    DeadReckoning,
}

/// Outlier eliminator selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlierMode {
    None,
    CentroidMedian,
    Plasmona,
}

/// Tracking lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    #[default]
    Stopped,
    Tracking,
}

/// Intermediate results published for inspection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Neighbour set before outlier elimination
    pub neighbours: Vec<ScoredPoint>,
    /// Candidates removed by the eliminator
    pub outliers: Vec<ScoredPoint>,
    /// Particle cloud after the last update
    pub particles: Vec<Particle>,
}

/// Fingerprints and way graph of one floor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloorData {
    pub fingerprints: Vec<Fingerprint>,
    pub edges: Vec<Edge>,
}

impl FloorData {
    pub fn new(fingerprints: Vec<Fingerprint>, edges: Vec<Edge>) -> Self {
        Self {
            fingerprints,
            edges,
        }
    }
}

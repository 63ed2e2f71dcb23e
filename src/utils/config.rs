//! Locator configuration with JSON persistence and validation

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::algorithms::dead_reckoning::DeadReckoningConfig;
use crate::algorithms::map_matching::MapMatchingMode;
use crate::algorithms::particle_filter::ParticleFilterConfig;
use crate::api::types::{LocalizationMode, OutlierMode};
use crate::hardware::wifi::ScanConfig;
use crate::processing::outlier::PlasmonaParams;
use crate::processing::smoother::StatisticFilterMode;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Invalid parameter value
    #[error("Invalid parameter '{parameter}' = {value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    /// Configuration file I/O error
    #[error("I/O error: {message}")]
    IoError { message: String },
    /// JSON serialization/deserialization error
    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// All tunables of the locator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub localization_mode: LocalizationMode,
    pub outlier_mode: OutlierMode,
    pub statistic_filter_mode: StatisticFilterMode,
    pub map_matching_mode: MapMatchingMode,
    /// Neighbours kept from each fingerprint match
    pub neighbour_count: usize,
    /// CentroidMedian elimination factor
    pub outlier_threshold: f64,
    pub plasmona: PlasmonaParams,
    /// Fixes kept by the history smoother
    pub history_size: usize,
    /// Fix tick period (milliseconds)
    pub tick_period_ms: u64,
    pub scan: ScanConfig,
    pub particle_filter: ParticleFilterConfig,
    pub dead_reckoning: DeadReckoningConfig,
    /// Switch floors automatically when WiFi points elsewhere
    pub auto_floor_detection: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            localization_mode: LocalizationMode::ParticleFilter,
            outlier_mode: OutlierMode::CentroidMedian,
            statistic_filter_mode: StatisticFilterMode::Median,
            map_matching_mode: MapMatchingMode::SimpleWaySnap,
            neighbour_count: 4,
            outlier_threshold: 2.0,
            plasmona: PlasmonaParams::default(),
            history_size: 5,
            tick_period_ms: 100,
            scan: ScanConfig::default(),
            particle_filter: ParticleFilterConfig::default(),
            dead_reckoning: DeadReckoningConfig::default(),
            auto_floor_detection: false,
        }
    }
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn check_weight(parameter: &str, weight: f64) -> ConfigResult<()> {
    if weight > 0.0 && weight <= 1.0 {
        Ok(())
    } else {
        Err(invalid(parameter, weight, "Low-pass weight must be in (0, 1]"))
    }
}

fn check_positive(parameter: &str, value: f64) -> ConfigResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(parameter, value, "Must be positive"))
    }
}

impl LocatorConfig {
    /// Load and validate a configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: LocatorConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
                message: format!("Failed to parse config file '{}': {}", path_str, e),
            })?;

        config.validate()?;
        log::info!("Loaded locator configuration from {}", path_str);
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializationError {
                message: format!("Failed to serialize config: {}", e),
            })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    /// Check every parameter, reporting the first invalid one
    pub fn validate(&self) -> ConfigResult<()> {
        if self.neighbour_count == 0 {
            return Err(invalid("neighbour_count", 0, "At least one neighbour is required"));
        }
        check_positive("outlier_threshold", self.outlier_threshold)?;
        check_positive("plasmona.link_factor", self.plasmona.link_factor)?;
        if self.plasmona.min_link_distance < 0.0 {
            return Err(invalid(
                "plasmona.min_link_distance",
                self.plasmona.min_link_distance,
                "Must not be negative",
            ));
        }
        if self.history_size == 0 {
            return Err(invalid("history_size", 0, "History must hold at least one fix"));
        }
        if self.tick_period_ms == 0 {
            return Err(invalid("tick_period_ms", 0, "Tick period must be at least 1 ms"));
        }
        if self.scan.rounds == 0 {
            return Err(invalid("scan.rounds", 0, "At least one scan round is required"));
        }

        let pf = &self.particle_filter;
        if pf.num_particles == 0 {
            return Err(invalid("particle_filter.num_particles", 0, "At least one particle is required"));
        }
        if pf.initial_spread_m < 0.0 {
            return Err(invalid("particle_filter.initial_spread_m", pf.initial_spread_m, "Must not be negative"));
        }
        if pf.process_noise_m < 0.0 {
            return Err(invalid("particle_filter.process_noise_m", pf.process_noise_m, "Must not be negative"));
        }
        check_positive("particle_filter.sensor_sigma_m", pf.sensor_sigma_m)?;

        let dr = &self.dead_reckoning;
        if dr.timestep_ms == 0 {
            return Err(invalid("dead_reckoning.timestep_ms", 0, "Timestep must be at least 1 ms"));
        }
        check_positive("dead_reckoning.speed_m_s", dr.speed_m_s)?;
        check_weight("dead_reckoning.accelerometer_weight", dr.accelerometer_weight)?;
        check_weight("dead_reckoning.magnetic_weight", dr.magnetic_weight)?;
        check_weight("dead_reckoning.linear_weight", dr.linear_weight)?;
        check_weight("dead_reckoning.compass_weight", dr.compass_weight)?;
        check_positive("dead_reckoning.moving_threshold", dr.moving_threshold)?;
        if dr.no_linear_sensor_threshold_factor < 1.0 {
            return Err(invalid(
                "dead_reckoning.no_linear_sensor_threshold_factor",
                dr.no_linear_sensor_threshold_factor,
                "Factor must not lower the threshold",
            ));
        }

        Ok(())
    }
}

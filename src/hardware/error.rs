//! Sensor and scanner error types

use thiserror::Error;

/// Errors raised by sensor-platform and WiFi-scanner collaborators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// Required sensor missing on this device
    #[error("Sensor not available: {0}")]
    NotAvailable(&'static str),
    /// Platform refused the listener registration
    #[error("Registration failed: {0}")]
    Registration(String),
    /// Worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    Thread(String),
}

/// Result type for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;

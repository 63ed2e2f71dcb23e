//! Interfaces to the sensor platform and WiFi scanner
//!
//! The drivers themselves live outside this crate. They push samples into
//! channels handed over at registration time.

pub mod error;
pub mod mock;
pub mod wifi;

pub use error::{SensorError, SensorResult};
pub use mock::{MockSensorHandle, MockSensorPlatform, MockWifiHandle, MockWifiScanner};
pub use wifi::{ScanCollector, ScanConfig, ScanMode, WifiCollector};

use crossbeam_channel::Sender;

use crate::core::RssiSample;

/// Motion sensor channels consumed by dead reckoning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Accelerometer,
    MagneticField,
    LinearAcceleration,
}

/// One 3-axis reading from the sensor platform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    pub kind: SensorKind,
    pub values: [f64; 3],
    pub timestamp_ms: u64,
}

impl SensorEvent {
    pub fn new(kind: SensorKind, values: [f64; 3]) -> Self {
        Self {
            kind,
            values,
            timestamp_ms: crate::core::current_time_ms(),
        }
    }
}

/// All samples of one WiFi scan
pub type ScanRound = Vec<RssiSample>;

/// Source of inertial and magnetic samples
pub trait SensorPlatform: Send {
    /// Whether a dedicated gravity-free linear accelerometer exists
    fn has_linear_accelerometer(&self) -> bool;

    /// Start delivering samples into `sink`
    fn register(&mut self, sink: Sender<SensorEvent>) -> SensorResult<()>;

    /// Stop delivering samples; calling it while unregistered is a no-op
    fn unregister(&mut self);
}

/// Source of WiFi scan rounds
pub trait WifiScanner: Send {
    /// Start scanning, delivering each finished round into `sink`
    fn start_scan(&mut self, sink: Sender<ScanRound>) -> SensorResult<()>;

    /// Stop scanning; calling it while stopped is a no-op
    fn stop_scan(&mut self);
}

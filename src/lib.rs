//! Indoor Positioning System
//!
//! Fuses WiFi fingerprint matching, inertial dead reckoning and corridor
//! topology into one continuously updated position.

pub mod core;
pub mod processing;
pub mod algorithms;
pub mod hardware;
pub mod api;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{
    DeltaVector, Edge, Fingerprint, FloorId, GeoPoint, GeoReference, MapMetadata, Point2D,
    RssiSample, ScoredPoint,
};
pub use processing::{
    DivergenceScorer, FingerprintMatcher, HistogramBuilder, NeighbourSet, OutlierEliminator,
    PositionHistorySmoother, SignalHistogram, StatisticFilterMode,
};
pub use algorithms::{
    DeadReckoningConfig, DeadReckoningEstimator, MapMatchingMode, ParticleFilter,
    ParticleFilterConfig,
};
pub use hardware::{
    ScanCollector, ScanConfig, ScanMode, SensorEvent, SensorKind, SensorPlatform, WifiCollector,
    WifiScanner,
};
pub use api::{
    Diagnostics, FingerprintDocument, FloorData, LocalizationMode, Locator, LocatorError,
    LocatorResult, OutlierMode,
};
pub use utils::{ConfigError, LocatorConfig};

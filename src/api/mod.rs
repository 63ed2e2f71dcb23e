//! Public tracking API
//!
//! The [`Locator`] wires matching, dead reckoning and fix production
//! together; [`export`] produces the fingerprint upload document.

pub mod types;
pub mod locator;
pub mod export;

pub use types::{
    Diagnostics, FloorData, LocalizationMode, LocatorError, LocatorResult, OutlierMode,
    TrackingState,
};
pub use locator::Locator;
pub use export::{ExportError, ExportResult, FingerprintDocument, FingerprintRecord};

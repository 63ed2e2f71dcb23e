//! Core types and constants for the indoor positioning system

pub mod types;
pub mod constants;
pub mod geo;
pub mod fusion;

pub use types::*;
pub use constants::*;
pub use geo::{GeoReference, GeoPoint};
pub use fusion::{FusedState, SharedFusion};

//! Signal and fix processing modules

pub mod histogram;
pub mod divergence;
pub mod matcher;
pub mod outlier;
pub mod interpolation;
pub mod smoother;
pub mod low_pass;

pub use histogram::{HistogramBuilder, LevelReduction, RouterLevelHistogram, SignalHistogram};
pub use divergence::{DivergenceScore, DivergenceScorer};
pub use matcher::{detect_floor, nearest_neighbours, FingerprintMatch, FingerprintMatcher, NeighbourSet};
pub use outlier::{OutlierEliminator, PlasmonaParams};
pub use interpolation::interpolate;
pub use smoother::{PositionHistorySmoother, StatisticFilterMode};
pub use low_pass::{CircularLowPassFilter, LowPassFilter};

//! Dissimilarity between two reduced histograms
//!
//! Each access point level is modelled as a Gaussian with a fixed spread, so
//! the per-AP Kullback-Leibler term is `(a - b)^2 / (2 sigma^2)`. The score is
//! the mean of that term over the access points both histograms share.

use crate::core::LEVEL_SIGMA_DBM;
use crate::processing::histogram::RouterLevelHistogram;

/// Result of comparing two histograms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceScore {
    /// Non-negative, zero for identical common levels, infinite without overlap
    pub divergence: f64,
    /// Share of the union of access points seen by both (0..=1)
    pub confidence: f64,
}

impl DivergenceScore {
    pub fn overlaps(&self) -> bool {
        self.confidence > 0.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DivergenceScorer {
    sigma_dbm: f64,
}

impl Default for DivergenceScorer {
    fn default() -> Self {
        Self {
            sigma_dbm: LEVEL_SIGMA_DBM,
        }
    }
}

impl DivergenceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sigma(sigma_dbm: f64) -> Self {
        Self { sigma_dbm }
    }

    pub fn score(&self, a: &RouterLevelHistogram, b: &RouterLevelHistogram) -> DivergenceScore {
        let two_sigma_sq = 2.0 * self.sigma_dbm * self.sigma_dbm;

        let mut common = 0usize;
        let mut sum = 0.0;
        for (ap, level_a) in a.levels() {
            if let Some(level_b) = b.level(ap) {
                let diff = level_a - level_b;
                sum += diff * diff / two_sigma_sq;
                common += 1;
            }
        }

        let union = a.len() + b.len() - common;
        if common == 0 {
            return DivergenceScore {
                divergence: f64::INFINITY,
                confidence: 0.0,
            };
        }

        DivergenceScore {
            divergence: sum / common as f64,
            confidence: common as f64 / union as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::histogram::{LevelReduction, SignalHistogram};
    use approx::assert_relative_eq;

    fn reduced(levels: &[(&str, i32)]) -> RouterLevelHistogram {
        SignalHistogram::from_levels("h", levels.iter().copied()).reduce(LevelReduction::Median)
    }

    #[test]
    fn test_identical_histograms() {
        let a = reduced(&[("x", -50), ("y", -70)]);
        let score = DivergenceScorer::new().score(&a, &a);
        assert_eq!(score.divergence, 0.0);
        assert_relative_eq!(score.confidence, 1.0);
    }

    #[test]
    fn test_more_similar_scores_lower() {
        let live = reduced(&[("x", -50)]);
        let near = reduced(&[("x", -55)]);
        let far = reduced(&[("x", -90)]);
        let scorer = DivergenceScorer::new();

        let near_score = scorer.score(&live, &near).divergence;
        let far_score = scorer.score(&live, &far).divergence;
        assert!(near_score > 0.0);
        assert!(near_score < far_score);
    }

    #[test]
    fn test_no_overlap() {
        let a = reduced(&[("x", -50)]);
        let b = reduced(&[("y", -50)]);
        let score = DivergenceScorer::new().score(&a, &b);
        assert!(score.divergence.is_infinite());
        assert_eq!(score.confidence, 0.0);
        assert!(!score.overlaps());
    }

    #[test]
    fn test_partial_overlap_confidence() {
        let a = reduced(&[("x", -50), ("y", -60)]);
        let b = reduced(&[("x", -50), ("z", -60)]);
        let score = DivergenceScorer::new().score(&a, &b);
        assert_relative_eq!(score.confidence, 1.0 / 3.0);
        assert_eq!(score.divergence, 0.0);
    }
}

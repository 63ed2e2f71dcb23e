//! Signal-strength histograms
//!
//! Raw per-access-point samples are aggregated into a level distribution per
//! access point ([`SignalHistogram`]) and reduced to one scalar per access
//! point ([`RouterLevelHistogram`]) for divergence scoring.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::core::RssiSample;

/// How a level distribution is collapsed into a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelReduction {
    /// Median of the observed levels, unweighted
    Median,
    /// Sum of level times fraction
    WeightedAverage,
}

/// Per-access-point level distributions.
///
/// Fractions for one access point sum to 1.0. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalHistogram {
    pub id: String,
    distributions: BTreeMap<String, BTreeMap<i32, f64>>,
}

impl SignalHistogram {
    /// Build directly from distributions, normalizing each access point.
    ///
    /// Access points whose weights sum to zero are dropped.
    pub fn from_distributions(
        id: impl Into<String>,
        distributions: BTreeMap<String, BTreeMap<i32, f64>>,
    ) -> Self {
        let distributions = distributions
            .into_iter()
            .filter_map(|(ap, levels)| {
                let total: f64 = levels.values().sum();
                if total <= 0.0 || !total.is_finite() {
                    return None;
                }
                let normalized = levels.into_iter().map(|(l, w)| (l, w / total)).collect();
                Some((ap, normalized))
            })
            .collect();

        Self {
            id: id.into(),
            distributions,
        }
    }

    /// Histogram where every access point was seen at exactly one level
    pub fn from_levels<I, S>(id: impl Into<String>, levels: I) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: Into<String>,
    {
        let distributions = levels
            .into_iter()
            .map(|(ap, level)| (ap.into(), BTreeMap::from([(level, 1.0)])))
            .collect();
        Self::from_distributions(id, distributions)
    }

    pub fn distributions(&self) -> &BTreeMap<String, BTreeMap<i32, f64>> {
        &self.distributions
    }

    pub fn distribution(&self, access_point_id: &str) -> Option<&BTreeMap<i32, f64>> {
        self.distributions.get(access_point_id)
    }

    pub fn access_point_count(&self) -> usize {
        self.distributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distributions.is_empty()
    }

    /// Collapse each access point to a single level
    pub fn reduce(&self, reduction: LevelReduction) -> RouterLevelHistogram {
        let levels = self
            .distributions
            .iter()
            .filter_map(|(ap, dist)| {
                let value = match reduction {
                    LevelReduction::Median => median_level(dist),
                    LevelReduction::WeightedAverage => {
                        Some(dist.iter().map(|(l, f)| *l as f64 * f).sum())
                    }
                };
                value.map(|v| (ap.clone(), v))
            })
            .collect();

        RouterLevelHistogram { levels }
    }
}

fn median_level(dist: &BTreeMap<i32, f64>) -> Option<f64> {
    // BTreeMap keys are already sorted
    let levels: Vec<i32> = dist.keys().copied().collect();
    let n = levels.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(levels[n / 2] as f64)
    } else {
        Some((levels[n / 2 - 1] as f64 + levels[n / 2] as f64) / 2.0)
    }
}

/// One scalar level per access point
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouterLevelHistogram {
    levels: BTreeMap<String, f64>,
}

impl RouterLevelHistogram {
    pub fn level(&self, access_point_id: &str) -> Option<f64> {
        self.levels.get(access_point_id).copied()
    }

    pub fn levels(&self) -> &BTreeMap<String, f64> {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Collects raw samples for one scan round or fingerprint
#[derive(Debug, Clone, Default)]
pub struct HistogramBuilder {
    samples: HashMap<String, Vec<RssiSample>>,
}

impl HistogramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample, keeping each access point's list ordered by time
    pub fn add_sample(&mut self, sample: RssiSample) {
        let list = self.samples.entry(sample.access_point_id.clone()).or_default();
        let idx = list.partition_point(|s| s.timestamp_ms <= sample.timestamp_ms);
        list.insert(idx, sample);
    }

    pub fn add_samples<I: IntoIterator<Item = RssiSample>>(&mut self, samples: I) {
        for sample in samples {
            self.add_sample(sample);
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Count levels into fractions.
    ///
    /// With `max_age_ms > 0`, samples older than `now_ms - max_age_ms` are
    /// discarded first. Access points left without samples are omitted.
    pub fn build(&self, id: impl Into<String>, max_age_ms: u64, now_ms: u64) -> SignalHistogram {
        let cutoff = if max_age_ms > 0 {
            now_ms.saturating_sub(max_age_ms)
        } else {
            0
        };

        let mut distributions = BTreeMap::new();
        for (ap, samples) in &self.samples {
            let surviving = samples.iter().filter(|s| s.timestamp_ms >= cutoff);
            let mut counts: BTreeMap<i32, f64> = BTreeMap::new();
            let mut total = 0usize;
            for sample in surviving {
                *counts.entry(sample.level_dbm).or_insert(0.0) += 1.0;
                total += 1;
            }
            if total == 0 {
                continue;
            }
            for count in counts.values_mut() {
                *count /= total as f64;
            }
            distributions.insert(ap.clone(), counts);
        }

        SignalHistogram {
            id: id.into(),
            distributions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HISTOGRAM_EPSILON;
    use approx::assert_relative_eq;

    fn builder_with(samples: &[(&str, i32, u64)]) -> HistogramBuilder {
        let mut builder = HistogramBuilder::new();
        for (ap, level, ts) in samples {
            builder.add_sample(RssiSample::new(*ap, *level, *ts));
        }
        builder
    }

    #[test]
    fn test_fractions_sum_to_one() {
        let builder = builder_with(&[
            ("a", -50, 1),
            ("a", -52, 2),
            ("a", -50, 3),
            ("b", -70, 1),
            ("b", -71, 2),
            ("b", -72, 3),
        ]);
        let histogram = builder.build("h", 0, 10);

        for dist in histogram.distributions().values() {
            let sum: f64 = dist.values().sum();
            assert!((sum - 1.0).abs() <= HISTOGRAM_EPSILON);
        }
        assert_relative_eq!(histogram.distribution("a").unwrap()[&-50], 2.0 / 3.0);
    }

    #[test]
    fn test_max_age_drops_old_samples_and_empty_aps() {
        let builder = builder_with(&[("old", -60, 100), ("a", -50, 100), ("a", -55, 950)]);
        let histogram = builder.build("h", 100, 1000);

        assert!(histogram.distribution("old").is_none());
        let a = histogram.distribution("a").unwrap();
        assert_eq!(a.len(), 1);
        assert_relative_eq!(a[&-55], 1.0);
    }

    #[test]
    fn test_median_single_level_unchanged() {
        let histogram = SignalHistogram::from_levels("h", [("a", -47), ("b", -83)]);
        let reduced = histogram.reduce(LevelReduction::Median);

        assert_eq!(reduced.level("a"), Some(-47.0));
        assert_eq!(reduced.level("b"), Some(-83.0));
    }

    #[test]
    fn test_median_even_count_averages_middle_levels() {
        let builder = builder_with(&[
            ("a", -40, 1),
            ("a", -50, 2),
            ("a", -50, 3),
            ("a", -50, 4),
            ("a", -60, 5),
            ("a", -70, 6),
        ]);
        let reduced = builder.build("h", 0, 10).reduce(LevelReduction::Median);
        // distinct levels -70, -60, -50, -40, not weighted by fraction
        assert_eq!(reduced.level("a"), Some(-55.0));
    }

    #[test]
    fn test_weighted_average() {
        let builder = builder_with(&[("a", -40, 1), ("a", -60, 2), ("a", -60, 3), ("a", -60, 4)]);
        let reduced = builder.build("h", 0, 10).reduce(LevelReduction::WeightedAverage);
        assert_relative_eq!(reduced.level("a").unwrap(), -55.0);
    }

    #[test]
    fn test_reduction_never_invents_access_points() {
        let histogram = SignalHistogram::from_levels("h", [("a", -50)]);
        let reduced = histogram.reduce(LevelReduction::WeightedAverage);
        assert_eq!(reduced.len(), 1);
        assert!(reduced.level("b").is_none());
    }

    #[test]
    fn test_samples_kept_time_ordered() {
        let mut builder = HistogramBuilder::new();
        builder.add_sample(RssiSample::new("a", -50, 30));
        builder.add_sample(RssiSample::new("a", -51, 10));
        builder.add_sample(RssiSample::new("a", -52, 20));

        let ts: Vec<u64> = builder.samples["a"].iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(ts, vec![10, 20, 30]);
    }

    #[test]
    fn test_json_level_keys_are_strings() {
        let histogram = SignalHistogram::from_levels("h", [("ap1", -50)]);
        let json = serde_json::to_value(&histogram).unwrap();
        assert_eq!(json["distributions"]["ap1"]["-50"], serde_json::json!(1.0));
    }
}

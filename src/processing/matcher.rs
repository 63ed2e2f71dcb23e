//! Fingerprint ranking and floor detection

use std::collections::{BTreeMap, BTreeSet};

use crate::core::{
    Fingerprint, FloorId, ScoredPoint, FLOOR_CONFIDENCE_THRESHOLD, FLOOR_HIT_TARGET,
};
use crate::processing::divergence::DivergenceScorer;
use crate::processing::histogram::{LevelReduction, RouterLevelHistogram, SignalHistogram};

/// Candidate positions ordered by divergence ascending
pub type NeighbourSet = BTreeSet<ScoredPoint>;

/// One stored fingerprint scored against a live histogram
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintMatch {
    pub fingerprint_id: String,
    pub scored: ScoredPoint,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
struct MatcherEntry {
    fingerprint: Fingerprint,
    reduced: RouterLevelHistogram,
}

/// Ranks the fingerprints of one floor against live histograms
#[derive(Debug, Clone, Default)]
pub struct FingerprintMatcher {
    entries: Vec<MatcherEntry>,
    scorer: DivergenceScorer,
}

impl FingerprintMatcher {
    pub fn new(fingerprints: Vec<Fingerprint>) -> Self {
        Self::with_scorer(fingerprints, DivergenceScorer::default())
    }

    pub fn with_scorer(fingerprints: Vec<Fingerprint>, scorer: DivergenceScorer) -> Self {
        // Stored histograms never change, so reduce them once
        let entries = fingerprints
            .into_iter()
            .map(|fingerprint| MatcherEntry {
                reduced: fingerprint.histogram.reduce(LevelReduction::Median),
                fingerprint,
            })
            .collect();
        Self { entries, scorer }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = &Fingerprint> {
        self.entries.iter().map(|e| &e.fingerprint)
    }

    /// Score every fingerprint, best match first
    pub fn score_all(&self, histogram: &SignalHistogram) -> Vec<FingerprintMatch> {
        let live = histogram.reduce(LevelReduction::Median);
        let mut matches: Vec<FingerprintMatch> = self
            .entries
            .iter()
            .map(|entry| {
                let score = self.scorer.score(&live, &entry.reduced);
                FingerprintMatch {
                    fingerprint_id: entry.fingerprint.id.clone(),
                    scored: ScoredPoint::new(entry.fingerprint.position, score.divergence),
                    confidence: score.confidence,
                }
            })
            .collect();
        matches.sort_by(|a, b| a.scored.cmp(&b.scored));
        matches
    }

    /// Rank all fingerprints into an ordered neighbour set
    pub fn match_histogram(&self, histogram: &SignalHistogram) -> NeighbourSet {
        self.score_all(histogram).into_iter().map(|m| m.scored).collect()
    }
}

/// The `k` best candidates, or all of them when fewer exist
pub fn nearest_neighbours(set: &NeighbourSet, k: usize) -> NeighbourSet {
    set.iter().take(k).copied().collect()
}

/// Pick the floor a histogram was most likely recorded on.
///
/// Candidates from all floors are walked best first. A candidate counts as a
/// hit for its floor only when its confidence exceeds the relevance threshold;
/// the first floor to collect enough hits wins. Otherwise the floor owning
/// the single closest candidate is returned.
pub fn detect_floor(
    floors: &BTreeMap<FloorId, FingerprintMatcher>,
    histogram: &SignalHistogram,
) -> Option<FloorId> {
    let mut candidates: Vec<(FloorId, FingerprintMatch)> = floors
        .iter()
        .flat_map(|(floor, matcher)| {
            matcher
                .score_all(histogram)
                .into_iter()
                .map(move |m| (*floor, m))
        })
        .collect();
    candidates.sort_by(|a, b| a.1.scored.cmp(&b.1.scored).then(a.0.cmp(&b.0)));

    let mut hits: BTreeMap<FloorId, usize> = BTreeMap::new();
    for (floor, candidate) in &candidates {
        if candidate.confidence > FLOOR_CONFIDENCE_THRESHOLD {
            let count = hits.entry(*floor).or_insert(0);
            *count += 1;
            if *count >= FLOOR_HIT_TARGET {
                return Some(*floor);
            }
        }
    }

    candidates.first().map(|(floor, _)| *floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point2D;

    fn fingerprint(id: &str, x: f64, y: f64, levels: &[(&str, i32)]) -> Fingerprint {
        Fingerprint {
            id: id.to_string(),
            position: Point2D::new(x, y),
            histogram: SignalHistogram::from_levels(id, levels.iter().copied()),
        }
    }

    fn live(levels: &[(&str, i32)]) -> SignalHistogram {
        SignalHistogram::from_levels("live", levels.iter().copied())
    }

    #[test]
    fn test_ranking_by_divergence() {
        let matcher = FingerprintMatcher::new(vec![
            fingerprint("far", 10.0, 0.0, &[("x", -90)]),
            fingerprint("exact", 0.0, 0.0, &[("x", -50)]),
            fingerprint("close", 5.0, 0.0, &[("x", -55)]),
        ]);
        let set = matcher.match_histogram(&live(&[("x", -50)]));

        let xs: Vec<f64> = set.iter().map(|s| s.point.x).collect();
        assert_eq!(xs, vec![0.0, 5.0, 10.0]);
        assert_eq!(set.iter().next().unwrap().divergence, 0.0);
    }

    #[test]
    fn test_empty_matcher_gives_empty_set() {
        let matcher = FingerprintMatcher::new(Vec::new());
        assert!(matcher.match_histogram(&live(&[("x", -50)])).is_empty());
    }

    #[test]
    fn test_nearest_neighbours_count() {
        let matcher = FingerprintMatcher::new(
            (0..6)
                .map(|i| fingerprint(&format!("fp{i}"), i as f64, 0.0, &[("x", -50 - i)]))
                .collect(),
        );
        let set = matcher.match_histogram(&live(&[("x", -50)]));

        for k in [1usize, 3, 6, 10] {
            let nearest = nearest_neighbours(&set, k);
            assert_eq!(nearest.len(), k.min(set.len()));
            let divs: Vec<f64> = nearest.iter().map(|s| s.divergence).collect();
            assert!(divs.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(nearest.iter().next(), set.iter().next());
        }
    }

    #[test]
    fn test_floor_with_enough_confident_hits_wins() {
        let levels = [("a", -50), ("b", -60), ("c", -70)];
        let ground: Vec<Fingerprint> = (0..6)
            .map(|i| {
                fingerprint(
                    &format!("g{i}"),
                    i as f64,
                    0.0,
                    &[("a", -52 - i), ("b", -62), ("c", -72)],
                )
            })
            .collect();
        let upper = vec![fingerprint("u0", 0.0, 0.0, &levels)];

        let floors = BTreeMap::from([
            (0, FingerprintMatcher::new(ground)),
            (1, FingerprintMatcher::new(upper)),
        ]);
        assert_eq!(detect_floor(&floors, &live(&levels)), Some(0));
    }

    #[test]
    fn test_floor_falls_back_to_closest_match() {
        let levels = [("a", -50), ("b", -60), ("c", -70)];
        // Only one AP in common: confidence 1/3, never a hit, but divergence 0
        let ground = vec![fingerprint("g0", 0.0, 0.0, &[("a", -50)])];
        let upper = vec![
            fingerprint("u0", 0.0, 0.0, &[("a", -60), ("b", -70), ("c", -80)]),
            fingerprint("u1", 1.0, 0.0, &[("a", -61), ("b", -71), ("c", -81)]),
        ];

        let floors = BTreeMap::from([
            (0, FingerprintMatcher::new(ground)),
            (1, FingerprintMatcher::new(upper)),
        ]);
        assert_eq!(detect_floor(&floors, &live(&levels)), Some(0));
    }

    #[test]
    fn test_low_confidence_matches_are_not_floor_hits() {
        let levels = [("a", -50), ("b", -60), ("c", -70)];
        // One AP of three in common: confidence 1/3 with divergence 0
        let ground: Vec<Fingerprint> = (0..5)
            .map(|i| fingerprint(&format!("g{i}"), i as f64, 0.0, &[("a", -50)]))
            .collect();
        let upper: Vec<Fingerprint> = (0..5)
            .map(|i| {
                fingerprint(
                    &format!("u{i}"),
                    i as f64,
                    0.0,
                    &[("a", -51 - i), ("b", -61), ("c", -71)],
                )
            })
            .collect();

        let floors = BTreeMap::from([
            (0, FingerprintMatcher::new(ground)),
            (1, FingerprintMatcher::new(upper)),
        ]);
        assert_eq!(detect_floor(&floors, &live(&levels)), Some(1));
    }

    #[test]
    fn test_confidence_at_threshold_is_not_a_hit() {
        let levels = [("a", -50), ("b", -60), ("c", -70), ("d", -80), ("e", -85)];
        // Two APs of five in common: confidence exactly 0.4
        let ground: Vec<Fingerprint> = (0..5)
            .map(|i| fingerprint(&format!("g{i}"), i as f64, 0.0, &[("a", -50), ("b", -60)]))
            .collect();
        let upper: Vec<Fingerprint> = (0..5)
            .map(|i| {
                fingerprint(
                    &format!("u{i}"),
                    i as f64,
                    0.0,
                    &[("a", -51 - i), ("b", -61), ("c", -71), ("d", -81), ("e", -86)],
                )
            })
            .collect();

        let scorer = DivergenceScorer::new();
        let reduced = |h: &SignalHistogram| h.reduce(LevelReduction::Median);
        let score = scorer.score(&reduced(&live(&levels)), &reduced(&ground[0].histogram));
        assert_eq!(score.confidence, FLOOR_CONFIDENCE_THRESHOLD);

        let floors = BTreeMap::from([
            (0, FingerprintMatcher::new(ground)),
            (1, FingerprintMatcher::new(upper)),
        ]);
        assert_eq!(detect_floor(&floors, &live(&levels)), Some(1));
    }

    #[test]
    fn test_floor_detection_without_fingerprints() {
        let floors: BTreeMap<FloorId, FingerprintMatcher> =
            BTreeMap::from([(0, FingerprintMatcher::default())]);
        assert_eq!(detect_floor(&floors, &live(&[("a", -50)])), None);
    }
}

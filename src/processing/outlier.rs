//! Removal of spatially inconsistent neighbour candidates

use serde::{Deserialize, Serialize};

use crate::core::{Point2D, ScoredPoint};
use crate::processing::matcher::NeighbourSet;

/// Candidates needed before any elimination is attempted
const MIN_CANDIDATES: usize = 3;

/// Tuning of the cluster based eliminator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlasmonaParams {
    /// Link distance as a multiple of the median nearest-neighbour distance
    pub link_factor: f64,
    /// Lower bound of the link distance (map units)
    pub min_link_distance: f64,
}

impl Default for PlasmonaParams {
    fn default() -> Self {
        Self {
            link_factor: 2.0,
            min_link_distance: 0.5,
        }
    }
}

/// Outlier elimination strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlierEliminator {
    None,
    /// Drop candidates further than `threshold` times the median distance
    /// from the componentwise median centroid
    CentroidMedian { threshold: f64 },
    /// Keep only the dominant cluster of candidates
    Plasmona(PlasmonaParams),
}

impl OutlierEliminator {
    /// Remove outliers in place, returning the removed candidates
    pub fn remove_outliers(&self, set: &mut NeighbourSet) -> Vec<ScoredPoint> {
        if set.len() < MIN_CANDIDATES {
            return Vec::new();
        }

        let removed: Vec<ScoredPoint> = match self {
            OutlierEliminator::None => Vec::new(),
            OutlierEliminator::CentroidMedian { threshold } => centroid_median_outliers(set, *threshold),
            OutlierEliminator::Plasmona(params) => cluster_outliers(set, params),
        };

        for outlier in &removed {
            set.remove(outlier);
        }
        removed
    }
}

/// Classic median, averaging the two middle values on even length
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        Some(values[n / 2])
    } else {
        Some((values[n / 2 - 1] + values[n / 2]) / 2.0)
    }
}

fn centroid_median_outliers(set: &NeighbourSet, threshold: f64) -> Vec<ScoredPoint> {
    let mut xs: Vec<f64> = set.iter().map(|s| s.point.x).collect();
    let mut ys: Vec<f64> = set.iter().map(|s| s.point.y).collect();
    let (Some(cx), Some(cy)) = (median(&mut xs), median(&mut ys)) else {
        return Vec::new();
    };
    let centroid = Point2D::new(cx, cy);

    let distances: Vec<f64> = set.iter().map(|s| s.point.distance_to(&centroid)).collect();
    let mut sorted = distances.clone();
    let Some(median_distance) = median(&mut sorted) else {
        return Vec::new();
    };
    let limit = threshold * median_distance;

    set.iter()
        .zip(distances)
        .filter(|(_, d)| *d > limit)
        .map(|(s, _)| *s)
        .collect()
}

fn cluster_outliers(set: &NeighbourSet, params: &PlasmonaParams) -> Vec<ScoredPoint> {
    let candidates: Vec<ScoredPoint> = set.iter().copied().collect();
    let n = candidates.len();

    let mut nearest: Vec<f64> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| j != i)
                .map(|j| candidates[i].point.distance_to(&candidates[j].point))
                .fold(f64::INFINITY, f64::min)
        })
        .collect();
    let Some(median_nearest) = median(&mut nearest) else {
        return Vec::new();
    };
    let link = (params.link_factor * median_nearest).max(params.min_link_distance);

    // Single-linkage clustering: flood fill over the "closer than link" graph
    let mut cluster_of = vec![usize::MAX; n];
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for start in 0..n {
        if cluster_of[start] != usize::MAX {
            continue;
        }
        let id = clusters.len();
        let mut members = vec![start];
        cluster_of[start] = id;
        let mut cursor = 0;
        while cursor < members.len() {
            let current = members[cursor];
            cursor += 1;
            for other in 0..n {
                if cluster_of[other] == usize::MAX
                    && candidates[current].point.distance_to(&candidates[other].point) <= link
                {
                    cluster_of[other] = id;
                    members.push(other);
                }
            }
        }
        clusters.push(members);
    }

    let spread = |members: &[usize]| -> f64 {
        let count = members.len() as f64;
        let cx = members.iter().map(|&i| candidates[i].point.x).sum::<f64>() / count;
        let cy = members.iter().map(|&i| candidates[i].point.y).sum::<f64>() / count;
        let centroid = Point2D::new(cx, cy);
        members
            .iter()
            .map(|&i| candidates[i].point.distance_to(&centroid))
            .sum::<f64>()
            / count
    };

    // Candidates are in divergence order, so the smallest index is the best match
    let best = clusters
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            b.len()
                .cmp(&a.len())
                .then_with(|| spread(a).total_cmp(&spread(b)))
                .then_with(|| a.iter().min().cmp(&b.iter().min()))
        })
        .map(|(id, _)| id);

    match best {
        Some(keep) => candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| cluster_of[*i] != keep)
            .map(|(_, s)| *s)
            .collect(),
        None => Vec::new(),
    }
}

//! Combining ranked neighbours into one position estimate

use crate::core::Point2D;
use crate::processing::matcher::NeighbourSet;

/// Reciprocal-divergence weighted interpolation.
///
/// An exact match (divergence zero) is returned unchanged. Returns `None`
/// for an empty set and when no candidate carries any weight.
pub fn interpolate(neighbours: &NeighbourSet) -> Option<Point2D> {
    if neighbours.is_empty() {
        return None;
    }

    if let Some(exact) = neighbours.iter().find(|n| n.divergence == 0.0) {
        return Some(exact.point);
    }

    let weights: Vec<f64> = neighbours.iter().map(|n| 1.0 / n.divergence).collect();
    let total: f64 = weights.iter().sum();

    // Every candidate had infinite divergence: no access point in common
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let (x, y) = neighbours
        .iter()
        .zip(&weights)
        .fold((0.0, 0.0), |(x, y), (n, w)| {
            let w = w / total;
            (x + n.point.x * w, y + n.point.y * w)
        });
    Some(Point2D::new(x, y))
}

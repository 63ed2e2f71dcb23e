//! Core data types for the indoor positioning system

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::processing::histogram::SignalHistogram;

/// Floor identifier as used by the map-data collaborator
pub type FloorId = i32;

/// 2D position in map units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        (self.to_vector() - other.to_vector()).norm()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn from_vector(v: Vector2<f64>) -> Self {
        Self { x: v.x, y: v.y }
    }

    /// Translate by a motion delta
    pub fn offset(&self, delta: DeltaVector) -> Self {
        Self {
            x: self.x + delta.dx,
            y: self.y + delta.dy,
        }
    }
}

/// A candidate position paired with the divergence of the fingerprint it came from.
///
/// Ordering is by divergence ascending, then by x and y, so two different
/// points never compare as equal.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoredPoint {
    pub point: Point2D,
    pub divergence: f64,
}

impl ScoredPoint {
    pub fn new(point: Point2D, divergence: f64) -> Self {
        Self { point, divergence }
    }
}

impl PartialEq for ScoredPoint {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredPoint {}

impl Ord for ScoredPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.divergence
            .total_cmp(&other.divergence)
            .then_with(|| self.point.x.total_cmp(&other.point.x))
            .then_with(|| self.point.y.total_cmp(&other.point.y))
    }
}

impl PartialOrd for ScoredPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Corridor segment of the way graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub a: Point2D,
    pub b: Point2D,
}

impl Edge {
    pub fn new(a: Point2D, b: Point2D) -> Self {
        Self { a, b }
    }

    /// Closest point on the segment to `p`
    pub fn closest_point(&self, p: &Point2D) -> Point2D {
        let a = self.a.to_vector();
        let ab = self.b.to_vector() - a;
        let len_sq = ab.norm_squared();
        if len_sq <= f64::EPSILON {
            return self.a;
        }
        let t = ((p.to_vector() - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
        Point2D::from_vector(a + ab * t)
    }
}

/// Single signal-strength observation of one access point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RssiSample {
    pub access_point_id: String,
    pub level_dbm: i32,
    pub timestamp_ms: u64,
}

impl RssiSample {
    pub fn new(access_point_id: impl Into<String>, level_dbm: i32, timestamp_ms: u64) -> Self {
        Self {
            access_point_id: access_point_id.into(),
            level_dbm,
            timestamp_ms,
        }
    }
}

/// Stored (position, histogram) pair used as ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub id: String,
    pub position: Point2D,
    pub histogram: SignalHistogram,
}

/// Displacement accumulated by dead reckoning, in map units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeltaVector {
    pub dx: f64,
    pub dy: f64,
}

impl DeltaVector {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            dx: self.dx * factor,
            dy: self.dy * factor,
        }
    }
}

/// Map resource metadata supplied once the floor plan is loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMetadata {
    /// Angle between map north and magnetic north (degrees)
    pub base_angle_deg: f64,
    /// Map units per meter
    pub scale: f64,
    /// Geometric center of the map, used for cold start
    pub bounding_box_center: Option<Point2D>,
}

impl Default for MapMetadata {
    fn default() -> Self {
        Self {
            base_angle_deg: 0.0,
            scale: 1.0,
            bounding_box_center: None,
        }
    }
}

/// Wall-clock time in milliseconds since the Unix epoch
pub fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::BTreeSet;

    #[test]
    fn test_scored_point_ordering() {
        let mut set = BTreeSet::new();
        set.insert(ScoredPoint::new(Point2D::new(1.0, 1.0), 3.0));
        set.insert(ScoredPoint::new(Point2D::new(2.0, 2.0), 1.0));
        set.insert(ScoredPoint::new(Point2D::new(0.0, 5.0), 1.0));

        let order: Vec<_> = set.iter().map(|s| s.point).collect();
        assert_eq!(
            order,
            vec![Point2D::new(0.0, 5.0), Point2D::new(2.0, 2.0), Point2D::new(1.0, 1.0)]
        );
    }

    #[test]
    fn test_equal_divergence_distinct_points_kept() {
        let a = ScoredPoint::new(Point2D::new(1.0, 2.0), 0.5);
        let b = ScoredPoint::new(Point2D::new(1.0, 3.0), 0.5);
        assert_ne!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn test_scored_point_equality_follows_ordering() {
        let nan = ScoredPoint::new(Point2D::new(1.0, 2.0), f64::NAN);
        assert_eq!(nan, nan);

        let pos = ScoredPoint::new(Point2D::new(0.0, 0.0), 0.0);
        let neg = ScoredPoint::new(Point2D::new(0.0, 0.0), -0.0);
        assert_ne!(pos, neg);
        assert_eq!(pos == neg, pos.cmp(&neg) == Ordering::Equal);
    }

    #[test]
    fn test_edge_closest_point_clamped() {
        let edge = Edge::new(Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0));

        let inside = edge.closest_point(&Point2D::new(4.0, 3.0));
        assert_relative_eq!(inside.x, 4.0);
        assert_relative_eq!(inside.y, 0.0);

        let beyond = edge.closest_point(&Point2D::new(15.0, -2.0));
        assert_eq!(beyond, Point2D::new(10.0, 0.0));
    }

    #[test]
    fn test_degenerate_edge() {
        let edge = Edge::new(Point2D::new(3.0, 3.0), Point2D::new(3.0, 3.0));
        assert_eq!(edge.closest_point(&Point2D::new(0.0, 0.0)), Point2D::new(3.0, 3.0));
    }
}

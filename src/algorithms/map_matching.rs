//! Snapping estimates onto the corridor graph

use serde::{Deserialize, Serialize};

use crate::core::{Edge, Point2D};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapMatchingMode {
    None,
    SimpleWaySnap,
}

/// Closest point on any edge of the way graph.
///
/// With no edges the input is returned unchanged. On ties the first edge in
/// slice order wins, so repeated calls agree.
pub fn snap(point: Point2D, edges: &[Edge]) -> Point2D {
    let mut best: Option<(f64, Point2D)> = None;
    for edge in edges {
        let candidate = edge.closest_point(&point);
        let d = candidate.distance_to(&point);
        if best.map_or(true, |(best_d, _)| d < best_d) {
            best = Some((d, candidate));
        }
    }
    best.map_or(point, |(_, p)| p)
}

/// Apply the configured matching mode
pub fn match_point(mode: MapMatchingMode, point: Point2D, edges: &[Edge]) -> Point2D {
    match mode {
        MapMatchingMode::None => point,
        MapMatchingMode::SimpleWaySnap => snap(point, edges),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn corridor() -> Vec<Edge> {
        vec![
            Edge::new(Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0)),
            Edge::new(Point2D::new(10.0, 0.0), Point2D::new(10.0, 10.0)),
            Edge::new(Point2D::new(0.0, 5.0), Point2D::new(4.0, 5.0)),
        ]
    }

    #[test]
    fn test_empty_edges_identity() {
        let p = Point2D::new(3.3, -7.1);
        assert_eq!(snap(p, &[]), p);
    }

    #[test]
    fn test_snaps_to_nearest_edge() {
        let p = snap(Point2D::new(3.0, 1.5), &corridor());
        assert_abs_diff_eq!(p.x, 3.0);
        assert_abs_diff_eq!(p.y, 0.0);

        let q = snap(Point2D::new(2.0, 4.0), &corridor());
        assert_eq!(q, Point2D::new(2.0, 5.0));
    }

    #[test]
    fn test_projection_clamped_to_segment_end() {
        let p = snap(Point2D::new(7.0, 5.5), &corridor());
        // (4, 5) is 3.04 away, (10, 5.5) is 3.0 away
        assert_abs_diff_eq!(p.x, 10.0);
        assert_abs_diff_eq!(p.y, 5.5);
    }

    #[test]
    fn test_snap_idempotent() {
        let edges = corridor();
        for p in [Point2D::new(3.0, 1.5), Point2D::new(11.0, -2.0), Point2D::new(6.0, 6.0)] {
            let once = snap(p, &edges);
            let twice = snap(once, &edges);
            assert_abs_diff_eq!(twice.x, once.x, epsilon = 1e-12);
            assert_abs_diff_eq!(twice.y, once.y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_corner_tie_stable() {
        let edges = corridor();
        let p = Point2D::new(11.0, -1.0);
        let first = snap(p, &edges);
        for _ in 0..5 {
            assert_eq!(snap(p, &edges), first);
        }
        assert_eq!(first, Point2D::new(10.0, 0.0));
    }

    #[test]
    fn test_mode_none_passthrough() {
        let p = Point2D::new(1.0, 1.0);
        assert_eq!(match_point(MapMatchingMode::None, p, &corridor()), p);
    }
}

//! Local map coordinates to geographic coordinates
//!
//! Buildings are small enough that a local tangent plane around one
//! reference point is accurate to well below fingerprint spacing.

use serde::{Deserialize, Serialize};

use super::types::Point2D;

/// Earth radius in meters (WGS84)
pub const EARTH_RADIUS_WGS84: f64 = 6378137.0;

/// Earth flattening factor (WGS84)
pub const EARTH_FLATTENING_WGS84: f64 = 1.0 / 298.257223563;

/// Eccentricity squared (WGS84)
pub const ECCENTRICITY_SQUARED_WGS84: f64 =
    2.0 * EARTH_FLATTENING_WGS84 - EARTH_FLATTENING_WGS84 * EARTH_FLATTENING_WGS84;

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Anchors the map origin on the globe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoReference {
    /// Geographic position of map point (0, 0)
    pub origin: GeoPoint,
    /// Map units per meter
    pub scale: f64,
}

impl GeoReference {
    pub fn new(origin: GeoPoint, scale: f64) -> Self {
        Self { origin, scale }
    }

    /// Meridional and prime-vertical radii of curvature at the origin
    fn radii(&self) -> (f64, f64) {
        let sin_lat = self.origin.latitude.to_radians().sin();
        let denom = 1.0 - ECCENTRICITY_SQUARED_WGS84 * sin_lat * sin_lat;
        let n = EARTH_RADIUS_WGS84 / denom.sqrt();
        let m = EARTH_RADIUS_WGS84 * (1.0 - ECCENTRICITY_SQUARED_WGS84) / denom.powf(1.5);
        (m, n)
    }

    /// Map point (x east, y north, map units) to latitude/longitude
    pub fn to_geographic(&self, point: &Point2D) -> GeoPoint {
        let (m, n) = self.radii();
        let east_m = point.x / self.scale;
        let north_m = point.y / self.scale;
        let cos_lat = self.origin.latitude.to_radians().cos();

        GeoPoint {
            latitude: self.origin.latitude + (north_m / m).to_degrees(),
            longitude: self.origin.longitude + (east_m / (n * cos_lat)).to_degrees(),
        }
    }

    /// Latitude/longitude back to map units
    pub fn to_local(&self, geo: &GeoPoint) -> Point2D {
        let (m, n) = self.radii();
        let cos_lat = self.origin.latitude.to_radians().cos();
        let north_m = (geo.latitude - self.origin.latitude).to_radians() * m;
        let east_m = (geo.longitude - self.origin.longitude).to_radians() * n * cos_lat;

        Point2D::new(east_m * self.scale, north_m * self.scale)
    }
}

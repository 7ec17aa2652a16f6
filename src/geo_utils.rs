//! Geographic utilities: great-circle distance and conversions.

use crate::GeoPoint;

/// Spherical Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (haversine formula).
///
/// Symmetric, zero for identical points, and finite for antipodal points:
/// the haversine term is clamped to `[0, 1]` so rounding can never push
/// `sqrt(1 - h)` into NaN territory.
///
/// # Example
/// ```
/// use session_tracker::{geo_utils::great_circle_distance, GeoPoint};
/// let london = GeoPoint::new(51.5007, -0.1246);
/// let paris = GeoPoint::new(48.8566, 2.3522);
/// let meters = great_circle_distance(&london, &paris);
/// assert!((meters - 343_556.0).abs() < 1_000.0);
/// ```
pub fn great_circle_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

impl From<GeoPoint> for geo::Point<f64> {
    fn from(p: GeoPoint) -> Self {
        geo::Point::new(p.longitude, p.latitude)
    }
}

impl From<geo::Point<f64>> for GeoPoint {
    fn from(p: geo::Point<f64>) -> Self {
        GeoPoint::new(p.y(), p.x())
    }
}

//! Pure geographic functions: great-circle distance, bearing, and polyline
//! sampling. No state, no I/O — grounded on the same kind of
//! haversine/bounding helpers used elsewhere in the wider Rust geospatial
//! ecosystem, adapted here to the engine's `(lat, lng)` point shape.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// A bare geographic point, independent of the richer [`crate::model::Location`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to `other`, in kilometers.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlng = (other.lng - self.lng).to_radians();

        let a = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }

    /// Initial bearing from `self` to `other`, in degrees [0, 360).
    pub fn bearing_deg(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlng = (other.lng - self.lng).to_radians();

        let y = dlng.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
        let theta = y.atan2(x).to_degrees();
        (theta + 360.0) % 360.0
    }

    fn lerp(&self, other: &GeoPoint, t: f64) -> GeoPoint {
        GeoPoint {
            lat: self.lat + (other.lat - self.lat) * t,
            lng: self.lng + (other.lng - self.lng) * t,
        }
    }
}

/// Builds a synthetic polyline between `start` and `end` by linear
/// interpolation, spaced at roughly `spacing_km` per segment with at least
/// `min_points` points total. This is the fallback route substituted
/// whenever the external routing service cannot be consulted in time.
pub fn fallback_polyline(start: GeoPoint, end: GeoPoint, spacing_km: f64, min_points: usize) -> Vec<GeoPoint> {
    let total_km = start.distance_km(&end);
    let by_spacing = if spacing_km > 0.0 {
        (total_km / spacing_km).ceil() as usize + 1
    } else {
        min_points
    };
    let n = by_spacing.max(min_points).max(2);

    (0..n)
        .map(|i| {
            let t = i as f64 / (n - 1) as f64;
            start.lerp(&end, t)
        })
        .collect()
}

/// Total length of a polyline, in kilometers, by summing consecutive
/// great-circle segments.
pub fn polyline_length_km(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| pair[0].distance_km(&pair[1]))
        .sum()
}

/// Samples a polyline at fractional progress `p` in [0, 1] by locating the
/// point at index `round(p * (len - 1))`. Spec §4.3 permits this
/// nearest-index sampling in place of true arc-length interpolation.
pub fn sample_polyline(points: &[GeoPoint], p: f64) -> GeoPoint {
    if points.is_empty() {
        return GeoPoint::new(0.0, 0.0);
    }
    let p = p.clamp(0.0, 1.0);
    let last = points.len() - 1;
    let idx = ((p * last as f64).round() as usize).min(last);
    points[idx]
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geo::GeoPoint;

/// A named or anonymous geographic point. Latitude is constrained to
/// `[-90, 90]` and longitude to `[-180, 180]` by [`Location::new`]; callers
/// that construct one directly (e.g. via `Deserialize`) are trusted to
/// respect the same bounds, matching the Store's trust boundary (§4.1: no
/// exceptions propagate to readers).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub name: Option<String>,
}

impl Location {
    pub fn new(lat: f64, lng: f64, name: Option<&str>) -> Self {
        debug_assert!((-90.0..=90.0).contains(&lat));
        debug_assert!((-180.0..=180.0).contains(&lng));
        Self {
            lat,
            lng,
            name: name.map(|s| s.to_string()),
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }

    pub fn distance_km(&self, other: &Location) -> f64 {
        self.point().distance_km(&other.point())
    }
}

impl From<GeoPoint> for Location {
    fn from(p: GeoPoint) -> Self {
        Location::new(p.lat, p.lng, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_matches_geo_point() {
        let a = Location::new(40.0, -75.0, Some("a"));
        let b = Location::new(41.0, -74.0, Some("b"));
        assert!((a.distance_km(&b) - a.point().distance_km(&b.point())).abs() < 1e-9);
    }
}

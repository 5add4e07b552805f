use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{LoadId, VehicleId};
use super::location::Location;

/// Load status. Transitions are monotone along `available -> matched ->
/// in_transit -> delivered`; `cancelled`/`expired` are reachable only
/// from `available` or `matched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Available,
    Matched,
    InTransit,
    Delivered,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Load {
    pub id: LoadId,
    pub origin: Location,
    pub destination: Location,
    pub weight_tons: f64,
    pub distance_km: f64,
    pub rate_per_km: f64,
    pub pickup_window_start: DateTime<Utc>,
    pub pickup_window_end: DateTime<Utc>,
    pub delivery_deadline: DateTime<Utc>,
    pub assigned_vehicle_id: Option<VehicleId>,
    pub status: LoadStatus,
}

impl Load {
    pub fn new(
        id: LoadId,
        origin: Location,
        destination: Location,
        weight_tons: f64,
        rate_per_km: f64,
        pickup_window_start: DateTime<Utc>,
        pickup_window_end: DateTime<Utc>,
        delivery_deadline: DateTime<Utc>,
    ) -> Self {
        let distance_km = origin.distance_km(&destination);
        Self {
            id,
            origin,
            destination,
            weight_tons,
            distance_km,
            rate_per_km,
            pickup_window_start,
            pickup_window_end,
            delivery_deadline,
            assigned_vehicle_id: None,
            status: LoadStatus::Available,
        }
    }

    pub fn is_available_for_pickup(&self, now: DateTime<Utc>) -> bool {
        self.status == LoadStatus::Available && now <= self.pickup_window_end
    }

    pub fn offered_revenue(&self) -> f64 {
        self.rate_per_km * self.distance_km
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn new_load_computes_distance_and_is_available() {
        let load = Load::new(
            LoadId(0),
            Location::new(0.0, 0.0, None),
            Location::new(1.0, 1.0, None),
            5.0,
            2.0,
            t(0),
            t(6),
            t(12),
        );
        assert!(load.distance_km > 0.0);
        assert!(load.is_available_for_pickup(t(1)));
        assert!(!load.is_available_for_pickup(t(7)));
    }

    #[test]
    fn revenue_scales_with_rate_and_distance() {
        let load = Load::new(
            LoadId(0),
            Location::new(0.0, 0.0, None),
            Location::new(0.0, 1.0, None),
            1.0,
            3.0,
            t(0),
            t(6),
            t(12),
        );
        assert!((load.offered_revenue() - 3.0 * load.distance_km).abs() < 1e-9);
    }
}

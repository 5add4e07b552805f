use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::VehicleId;
use super::location::Location;

/// Vehicle status. Invariant: `idle` implies no active trip references
/// this vehicle; any `en_route_*`/`at_pickup`/`at_delivery` status implies
/// exactly one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Idle,
    EnRouteEmpty,
    EnRouteLoaded,
    AtPickup,
    AtDelivery,
    Maintenance,
    Offline,
}

impl VehicleStatus {
    pub fn is_active_leg(&self) -> bool {
        matches!(
            self,
            VehicleStatus::EnRouteEmpty
                | VehicleStatus::EnRouteLoaded
                | VehicleStatus::AtPickup
                | VehicleStatus::AtDelivery
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Vehicle {
    pub id: VehicleId,
    pub driver_id: String,
    pub capacity_tons: f64,
    pub current_load_tons: f64,
    pub fuel_percent: f64,
    pub driving_hours_remaining: f64,
    pub total_km_today: f64,
    pub loaded_km_today: f64,
    pub last_activity_at: DateTime<Utc>,
    pub location: Location,
    pub home_depot: Option<Location>,
    pub status: VehicleStatus,
}

impl Vehicle {
    pub fn new(
        id: VehicleId,
        driver_id: impl Into<String>,
        capacity_tons: f64,
        location: Location,
        home_depot: Option<Location>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            driver_id: driver_id.into(),
            capacity_tons,
            current_load_tons: 0.0,
            fuel_percent: 100.0,
            driving_hours_remaining: 11.0,
            total_km_today: 0.0,
            loaded_km_today: 0.0,
            last_activity_at: now,
            location,
            home_depot,
            status: VehicleStatus::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == VehicleStatus::Idle
    }

    pub fn utilization(&self) -> f64 {
        if self.total_km_today <= 0.0 {
            0.0
        } else {
            (self.loaded_km_today / self.total_km_today).clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn new_vehicle_is_idle_and_empty() {
        let v = Vehicle::new(
            VehicleId(0),
            "driver-1",
            20.0,
            Location::new(0.0, 0.0, None),
            None,
            now(),
        );
        assert!(v.is_idle());
        assert_eq!(v.current_load_tons, 0.0);
        assert_eq!(v.utilization(), 0.0);
    }

    #[test]
    fn utilization_is_loaded_over_total() {
        let mut v = Vehicle::new(
            VehicleId(0),
            "driver-1",
            20.0,
            Location::new(0.0, 0.0, None),
            None,
            now(),
        );
        v.total_km_today = 100.0;
        v.loaded_km_today = 40.0;
        assert!((v.utilization() - 0.4).abs() < 1e-9);
    }
}

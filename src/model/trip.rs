use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{LoadId, TripId, VehicleId};
use crate::geo::GeoPoint;

/// Trip phase. Transitions follow the fixed order `planning ->
/// en_route_to_pickup -> loading -> in_transit -> unloading -> completed`,
/// with `cancelled` reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TripPhase {
    Planning,
    EnRouteToPickup,
    Loading,
    InTransit,
    Unloading,
    Completed,
    Cancelled,
}

impl TripPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripPhase::Completed | TripPhase::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Trip {
    pub id: TripId,
    pub vehicle_id: VehicleId,
    pub load_id: LoadId,
    pub phase: TripPhase,
    /// Cached route polyline, pickup leg followed by loaded leg,
    /// concatenated.
    #[serde(skip)]
    pub route: Vec<GeoPoint>,
    pub route_total_km: f64,
    pub progress_percent: f64,
    pub empty_leg_km: f64,
    pub loaded_leg_km: f64,
    pub estimated_revenue: f64,
    pub estimated_fuel_cost: f64,
    pub estimated_net_profit: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Accumulated delay in minutes, adjusted by the Adapter's
    /// `ADJUST_ROUTE` decision and consumed by the Predictor.
    pub delay_minutes: f64,
    /// Set by the Adapter's `FOLLOW_UP_LOAD` decision; honored by Motion
    /// when this trip's `unloading` phase completes.
    pub followup_load_id: Option<LoadId>,
    /// Economics of the follow-up load, computed by the Adapter's
    /// opportunity search at decision time and carried over verbatim to
    /// the spawned follow-up trip.
    pub followup_empty_leg_km: f64,
    pub followup_loaded_leg_km: f64,
    pub followup_revenue: f64,
    pub followup_cost: f64,
    /// Index into `route` marking where the pickup leg ends and the
    /// loaded leg begins; used to decide when cargo should be counted as
    /// loaded during Motion ticks.
    pub pickup_leg_points: usize,
    /// Held-phase marker so `loading`/`unloading` last exactly one tick.
    #[serde(skip)]
    pub phase_entered_this_tick: bool,
}

impl Trip {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TripId,
        vehicle_id: VehicleId,
        load_id: LoadId,
        empty_leg_km: f64,
        loaded_leg_km: f64,
        estimated_revenue: f64,
        estimated_fuel_cost: f64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            vehicle_id,
            load_id,
            phase: TripPhase::Planning,
            route: Vec::new(),
            route_total_km: 0.0,
            progress_percent: 0.0,
            empty_leg_km,
            loaded_leg_km,
            estimated_revenue,
            estimated_fuel_cost,
            estimated_net_profit: estimated_revenue - estimated_fuel_cost,
            started_at,
            completed_at: None,
            delay_minutes: 0.0,
            followup_load_id: None,
            followup_empty_leg_km: 0.0,
            followup_loaded_leg_km: 0.0,
            followup_revenue: 0.0,
            followup_cost: 0.0,
            pickup_leg_points: 0,
            phase_entered_this_tick: true,
        }
    }

    pub fn progress_fraction(&self) -> f64 {
        (self.progress_percent / 100.0).clamp(0.0, 1.0)
    }

    pub fn has_route(&self) -> bool {
        !self.route.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_trip_starts_in_planning_with_zero_progress() {
        let trip = Trip::new(
            TripId(0),
            VehicleId(0),
            LoadId(0),
            10.0,
            50.0,
            200.0,
            40.0,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        );
        assert_eq!(trip.phase, TripPhase::Planning);
        assert_eq!(trip.progress_percent, 0.0);
        assert!(!trip.has_route());
        assert!((trip.estimated_net_profit - 160.0).abs() < 1e-9);
    }

    #[test]
    fn terminal_phases() {
        assert!(TripPhase::Completed.is_terminal());
        assert!(TripPhase::Cancelled.is_terminal());
        assert!(!TripPhase::InTransit.is_terminal());
    }
}

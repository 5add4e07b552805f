//! Predictor: a pure function of a [`Snapshot`] producing per-trip ETA,
//! remaining distance, current speed, fuel-at-arrival, and on-time
//! status, plus priority-ordered advisories. No state, no I/O.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::{Config, PredictorConfig};
use crate::model::event::EventKind;
use crate::model::snapshot::Snapshot;
use crate::model::trip::TripPhase;
use crate::model::{LoadStatus, TripId, VehicleId, VehicleStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OnTimeStatus {
    OnTime,
    Delayed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    Refuel,
    Rest,
    DelayNotification,
    OnTrack,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TripPrediction {
    pub trip_id: TripId,
    pub vehicle_id: VehicleId,
    pub remaining_distance_km: f64,
    pub current_speed_kmh: f64,
    pub eta_seconds: f64,
    pub eta_at: DateTime<Utc>,
    pub fuel_remaining_at_arrival_pct: f64,
    pub on_time: OnTimeStatus,
    pub advisories: Vec<Advisory>,
}

/// `Predict(snapshot) -> list of trip-predictions`.
pub fn predict(snapshot: &Snapshot, config: &Config) -> Vec<TripPrediction> {
    let now = snapshot.snapshot_at;
    snapshot
        .active_trips()
        .filter_map(|trip| {
            let vehicle = snapshot.vehicles.get(&trip.vehicle_id)?;
            let load = snapshot.loads.get(&trip.load_id)?;

            let remaining_distance_km = (1.0 - trip.progress_fraction()) * trip.route_total_km;
            let base_speed_kmh = config.motion.speed_kmh;

            let latest_delay_minutes = latest_traffic_delay_minutes(snapshot, trip.vehicle_id);
            let traffic_delay_seconds =
                latest_delay_minutes * 60.0 * config.predictor.traffic_delay_weight;
            let adapter_delay_seconds = trip.delay_minutes * 60.0;

            let base_eta_seconds = if base_speed_kmh > 0.0 {
                remaining_distance_km / base_speed_kmh * 3600.0
            } else {
                0.0
            };
            let eta_seconds = base_eta_seconds + traffic_delay_seconds + adapter_delay_seconds;
            let eta_at = now + chrono::Duration::milliseconds((eta_seconds * 1000.0) as i64);

            let current_speed_kmh = if eta_seconds > 0.0 {
                remaining_distance_km / (eta_seconds / 3600.0)
            } else {
                base_speed_kmh
            };

            let consumption_rate_pct_per_km = if matches!(trip.phase, TripPhase::InTransit) {
                config.motion.fuel_loaded_pct_per_10km / 10.0
            } else {
                config.motion.fuel_empty_pct_per_10km / 10.0
            };
            let fuel_remaining_at_arrival_pct =
                vehicle.fuel_percent - consumption_rate_pct_per_km * remaining_distance_km;

            let on_time = if eta_at <= load.delivery_deadline {
                OnTimeStatus::OnTime
            } else {
                OnTimeStatus::Delayed
            };

            let eta_hours = eta_seconds / 3600.0;
            let advisories = recommendations(
                &config.predictor,
                fuel_remaining_at_arrival_pct,
                vehicle.driving_hours_remaining,
                eta_hours,
                &on_time,
            );

            Some(TripPrediction {
                trip_id: trip.id,
                vehicle_id: trip.vehicle_id,
                remaining_distance_km,
                current_speed_kmh,
                eta_seconds,
                eta_at,
                fuel_remaining_at_arrival_pct,
                on_time,
                advisories,
            })
        })
        .collect()
}

fn latest_traffic_delay_minutes(snapshot: &Snapshot, vehicle_id: VehicleId) -> f64 {
    snapshot
        .recent_events
        .iter()
        .rev()
        .find_map(|event| match &event.kind {
            EventKind::TrafficAlert {
                vehicle_id: v,
                delay_minutes,
                ..
            } if *v == vehicle_id => Some(*delay_minutes),
            _ => None,
        })
        .unwrap_or(0.0)
}

fn recommendations(
    config: &PredictorConfig,
    fuel_remaining_at_arrival_pct: f64,
    driving_hours_remaining: f64,
    eta_hours: f64,
    on_time: &OnTimeStatus,
) -> Vec<Advisory> {
    let mut advisories = Vec::new();
    if fuel_remaining_at_arrival_pct < config.low_fuel_threshold_pct {
        advisories.push(Advisory::Refuel);
    }
    if driving_hours_remaining < eta_hours {
        advisories.push(Advisory::Rest);
    }
    if *on_time == OnTimeStatus::Delayed {
        advisories.push(Advisory::DelayNotification);
    }
    if advisories.is_empty() {
        advisories.push(Advisory::OnTrack);
    }
    advisories
}

/// Aggregate fleet-wide KPI object.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Kpis {
    pub total_vehicles: usize,
    pub available_vehicles: usize,
    pub idle_vehicles: usize,
    pub en_route_vehicles: usize,
    pub total_loads: usize,
    pub available_loads: usize,
    pub matched_loads: usize,
    pub in_transit_loads: usize,
    pub avg_utilization: f64,
    pub total_km_today: f64,
}

pub fn kpis(snapshot: &Snapshot) -> Kpis {
    let total_vehicles = snapshot.vehicles.len();
    let idle_vehicles = snapshot
        .vehicles
        .values()
        .filter(|v| v.status == VehicleStatus::Idle)
        .count();
    let en_route_vehicles = snapshot
        .vehicles
        .values()
        .filter(|v| v.status.is_active_leg())
        .count();
    let available_vehicles = idle_vehicles;

    let total_loads = snapshot.loads.len();
    let available_loads = snapshot
        .loads
        .values()
        .filter(|l| l.status == LoadStatus::Available)
        .count();
    let matched_loads = snapshot
        .loads
        .values()
        .filter(|l| l.status == LoadStatus::Matched)
        .count();
    let in_transit_loads = snapshot
        .loads
        .values()
        .filter(|l| l.status == LoadStatus::InTransit)
        .count();

    let total_km_today: f64 = snapshot.vehicles.values().map(|v| v.total_km_today).sum();
    let avg_utilization = if total_vehicles == 0 {
        0.0
    } else {
        snapshot.vehicles.values().map(|v| v.utilization()).sum::<f64>() / total_vehicles as f64
            * 100.0
    };

    Kpis {
        total_vehicles,
        available_vehicles,
        idle_vehicles,
        en_route_vehicles,
        total_loads,
        available_loads,
        matched_loads,
        in_transit_loads,
        avg_utilization,
        total_km_today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::{Event, EventId, Load, LoadId, Location, Trip, Vehicle};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn base_snapshot() -> (Snapshot, Config) {
        let config = Config::default();
        let now = Utc::now();
        let vehicle = Vehicle::new(
            VehicleId(1),
            "driver-1",
            20.0,
            Location::new(0.0, 0.0, None),
            None,
            now,
        );
        let mut load = Load::new(
            LoadId(1),
            Location::new(0.0, 0.0, None),
            Location::new(1.0, 1.0, None),
            5.0,
            2.0,
            now,
            now + chrono::Duration::hours(6),
            now + chrono::Duration::hours(12),
        );
        load.status = LoadStatus::InTransit;
        load.assigned_vehicle_id = Some(VehicleId(1));

        let mut trip = Trip::new(TripId(1), VehicleId(1), LoadId(1), 0.0, 100.0, 200.0, 40.0, now);
        trip.phase = TripPhase::InTransit;
        trip.route_total_km = 100.0;
        trip.progress_percent = 50.0;

        let mut vehicles = BTreeMap::new();
        vehicles.insert(VehicleId(1), Arc::new(vehicle));
        let mut loads = BTreeMap::new();
        loads.insert(LoadId(1), Arc::new(load));
        let mut trips = BTreeMap::new();
        trips.insert(TripId(1), Arc::new(trip));

        (
            Snapshot {
                snapshot_at: now,
                vehicles,
                loads,
                trips,
                recent_events: Vec::new(),
            },
            config,
        )
    }

    #[test]
    fn predicts_on_time_with_no_traffic() {
        let (snapshot, config) = base_snapshot();
        let predictions = predict(&snapshot, &config);
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].on_time, OnTimeStatus::OnTime);
        assert!(predictions[0].advisories.contains(&Advisory::OnTrack));
    }

    #[test]
    fn traffic_alert_increases_eta() {
        let (snapshot, config) = base_snapshot();
        let base = predict(&snapshot, &config)[0].eta_seconds;

        let mut with_traffic = snapshot.clone();
        with_traffic.recent_events.push(Arc::new(Event {
            id: EventId(1),
            at: snapshot.snapshot_at,
            seq: 1,
            kind: EventKind::TrafficAlert {
                vehicle_id: VehicleId(1),
                delay_minutes: 90.0,
                reason: "congestion".into(),
            },
        }));
        let with_delay = predict(&with_traffic, &config)[0].eta_seconds;

        assert!(with_delay >= base + 90.0 * 60.0 * config.predictor.traffic_delay_weight - 1e-6);
    }

    #[test]
    fn low_fuel_triggers_refuel_advisory() {
        let (mut snapshot, config) = base_snapshot();
        {
            let vehicle = snapshot.vehicles.get_mut(&VehicleId(1)).unwrap();
            let mut v = (**vehicle).clone();
            v.fuel_percent = 5.0;
            *vehicle = Arc::new(v);
        }
        let predictions = predict(&snapshot, &config);
        assert!(predictions[0].advisories.contains(&Advisory::Refuel));
    }

    #[test]
    fn kpis_count_by_status() {
        let (snapshot, _config) = base_snapshot();
        let k = kpis(&snapshot);
        assert_eq!(k.total_vehicles, 1);
        assert_eq!(k.total_loads, 1);
        assert_eq!(k.in_transit_loads, 1);
    }
}

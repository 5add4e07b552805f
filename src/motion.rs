//! Motion Engine: advances every active trip one tick along its cached
//! route, updates vehicle position/odometers/fuel/driving hours, and
//! drives trip phase transitions.

use std::sync::Arc;

use chrono::Utc;

use crate::config::MotionConfig;
use crate::model::{
    Event, EventKind, Load, LoadId, LoadStatus, Location, Trip, TripId, TripPhase, Vehicle,
    VehicleId, VehicleStatus,
};
use crate::routing::RouteCache;
use crate::store::Store;

/// Advances every active trip by `dt_seconds`. `tick_index` decimates
/// position events (spec: emit every Nth tick or at phase boundaries) and
/// the combination of `(tick timestamp, intra-tick seq)` totally orders
/// events emitted within the tick (assigned by the Store on `apply_events`).
pub async fn tick(
    store: &Store,
    route_cache: &RouteCache,
    config: &MotionConfig,
    tick_index: u64,
    dt_seconds: f64,
) -> Vec<Arc<Event>> {
    let snapshot = store.snapshot().await;
    let mut trip_ids: Vec<TripId> = snapshot.active_trips().map(|t| t.id).collect();
    trip_ids.sort();

    let mut kinds = Vec::new();
    for trip_id in trip_ids {
        let Some(trip) = snapshot.trips.get(&trip_id) else {
            continue;
        };
        let Some(vehicle) = snapshot.vehicles.get(&trip.vehicle_id) else {
            continue;
        };
        let Some(load) = snapshot.loads.get(&trip.load_id) else {
            continue;
        };

        step_trip(store, route_cache, config, trip, vehicle, load, tick_index, dt_seconds, &mut kinds)
            .await;
    }

    if kinds.is_empty() {
        Vec::new()
    } else {
        store.apply_events(kinds).await
    }
}

#[allow(clippy::too_many_arguments)]
async fn step_trip(
    store: &Store,
    route_cache: &RouteCache,
    config: &MotionConfig,
    trip: &Arc<Trip>,
    vehicle: &Arc<Vehicle>,
    load: &Arc<Load>,
    tick_index: u64,
    dt_seconds: f64,
    events: &mut Vec<EventKind>,
) {
    let trip_id = trip.id;
    let vehicle_id = trip.vehicle_id;
    let load_id = trip.load_id;

    if !trip.has_route() {
        let pickup = route_cache.route(vehicle.location, load.origin).await;
        let loaded = route_cache.route(load.origin, load.destination).await;

        let mut combined = pickup.points.clone();
        combined.extend(loaded.points.iter().copied());
        let pickup_leg_points = pickup.points.len();
        let route_total_km = pickup.distance_km + loaded.distance_km;

        let _ = store
            .update_trip(trip_id, move |t| {
                t.route = combined;
                t.route_total_km = route_total_km;
                t.pickup_leg_points = pickup_leg_points;
                t.empty_leg_km = pickup.distance_km;
                t.loaded_leg_km = loaded.distance_km;
            })
            .await;
        return;
    }

    match trip.phase {
        TripPhase::Planning => {
            let pickup_fraction = if trip.route_total_km > 0.0 {
                trip.empty_leg_km / trip.route_total_km
            } else {
                0.0
            };
            let next_phase = if pickup_fraction < 1e-6 {
                TripPhase::Loading
            } else {
                TripPhase::EnRouteToPickup
            };
            let _ = store
                .update_trip(trip_id, move |t| t.phase = next_phase)
                .await;
        }

        TripPhase::EnRouteToPickup => {
            let pickup_fraction = if trip.route_total_km > 0.0 {
                trip.empty_leg_km / trip.route_total_km
            } else {
                0.0
            };
            advance_progress(
                store, route_cache, config, trip, vehicle, tick_index, dt_seconds, events,
                Some(pickup_fraction), TripPhase::Loading,
            )
            .await;
        }

        TripPhase::Loading => {
            let weight = load.weight_tons;
            let _ = store
                .update_trip(trip_id, |t| t.phase = TripPhase::InTransit)
                .await;
            let _ = store
                .update_vehicle(vehicle_id, move |v| {
                    v.status = VehicleStatus::EnRouteLoaded;
                    v.current_load_tons = weight;
                })
                .await;
            let _ = store
                .update_load(load_id, |l| l.status = LoadStatus::InTransit)
                .await;
        }

        TripPhase::InTransit => {
            advance_progress(
                store, route_cache, config, trip, vehicle, tick_index, dt_seconds, events,
                None, TripPhase::Unloading,
            )
            .await;
        }

        TripPhase::Unloading => {
            let followup = trip.followup_load_id;
            let now = Utc::now();
            let _ = store
                .update_trip(trip_id, move |t| {
                    t.phase = TripPhase::Completed;
                    t.completed_at = Some(now);
                })
                .await;
            let _ = store
                .update_load(load_id, |l| l.status = LoadStatus::Delivered)
                .await;
            let _ = store
                .update_vehicle(vehicle_id, move |v| {
                    v.current_load_tons = 0.0;
                    v.status = VehicleStatus::Idle;
                })
                .await;
            let _ = store.remove_trip(trip_id).await;
            events.push(EventKind::TripCompleted { trip_id });

            if let Some(followup_load_id) = followup {
                spawn_followup_trip(
                    store,
                    vehicle_id,
                    followup_load_id,
                    trip.followup_empty_leg_km,
                    trip.followup_loaded_leg_km,
                    trip.followup_revenue,
                    trip.followup_cost,
                )
                .await;
            }
        }

        TripPhase::Completed | TripPhase::Cancelled => {}
    }
}

#[allow(clippy::too_many_arguments)]
async fn advance_progress(
    store: &Store,
    _route_cache: &RouteCache,
    config: &MotionConfig,
    trip: &Arc<Trip>,
    vehicle: &Arc<Vehicle>,
    tick_index: u64,
    dt_seconds: f64,
    events: &mut Vec<EventKind>,
    clamp_at: Option<f64>,
    phase_on_clamp: TripPhase,
) {
    let vehicle_id = vehicle.id;
    let trip_id = trip.id;
    let route_total_km = trip.route_total_km;
    let p0 = trip.progress_fraction();
    let target = clamp_at.unwrap_or(1.0);

    if vehicle.driving_hours_remaining <= 0.0 {
        // Hours exhausted: hold progress this tick and surface the
        // condition. Rest is instantaneous at this layer, so the next
        // tick resumes with a full allotment.
        let max_driving_hours = config.max_driving_hours;
        let _ = store
            .update_vehicle(vehicle_id, move |v| {
                v.driving_hours_remaining = max_driving_hours;
                v.last_activity_at = Utc::now();
            })
            .await;
        events.push(EventKind::DriverRestRequired { vehicle_id });
        return;
    }

    let delta_p = if route_total_km > 0.0 {
        (target - p0).min(config.speed_kmh * dt_seconds / 3600.0 / route_total_km)
    } else {
        target - p0
    };
    let delta_p = delta_p.max(0.0);
    let p1 = (p0 + delta_p).min(target);

    let position = crate::geo::sample_polyline(&trip.route, p1);
    let delta_km = (p1 - p0) * route_total_km;
    let is_loaded_leg = matches!(trip.phase, TripPhase::InTransit);
    let fuel_rate = if is_loaded_leg {
        config.fuel_loaded_pct_per_10km
    } else {
        config.fuel_empty_pct_per_10km
    } / 10.0;

    let reached_target = p1 >= target - 1e-9;
    let next_phase = if reached_target { Some(phase_on_clamp) } else { None };
    let progress_percent = p1 * 100.0;
    let loc: Location = position.into();

    let _ = store
        .update_vehicle(vehicle_id, move |v| {
            v.location = loc;
            v.total_km_today += delta_km;
            if is_loaded_leg {
                v.loaded_km_today += delta_km;
            }
            v.fuel_percent = (v.fuel_percent - fuel_rate * delta_km).max(0.0);
            v.driving_hours_remaining = (v.driving_hours_remaining - dt_seconds / 3600.0).max(0.0);
            v.last_activity_at = Utc::now();
        })
        .await;

    let _ = store
        .update_trip(trip_id, move |t| {
            t.progress_percent = progress_percent;
            if let Some(phase) = next_phase {
                t.phase = phase;
            }
        })
        .await;

    if tick_index % config.position_event_every_n_ticks as u64 == 0 || next_phase.is_some() {
        events.push(EventKind::VehiclePositionUpdate {
            vehicle_id,
            lat: loc.lat,
            lng: loc.lng,
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn spawn_followup_trip(
    store: &Store,
    vehicle_id: VehicleId,
    followup_load_id: LoadId,
    empty_leg_km: f64,
    loaded_leg_km: f64,
    estimated_revenue: f64,
    estimated_fuel_cost: f64,
) {
    let trip_id = store.ids().next_trip();
    let now = Utc::now();
    let trip = Trip::new(
        trip_id,
        vehicle_id,
        followup_load_id,
        empty_leg_km,
        loaded_leg_km,
        estimated_revenue,
        estimated_fuel_cost,
        now,
    );
    if store.insert_trip(trip).await.is_ok() {
        let _ = store
            .update_load(followup_load_id, move |l| {
                l.status = LoadStatus::Matched;
                l.assigned_vehicle_id = Some(vehicle_id);
            })
            .await;
        let _ = store
            .update_vehicle(vehicle_id, |v| v.status = VehicleStatus::EnRouteEmpty)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::NullAdvisorClient;
    use crate::error::RouteError;
    use crate::model::{Location, VehicleId};
    use crate::routing::{RouteClient, RouteResponse};
    use async_trait::async_trait;
    use std::sync::Arc as StdArc;
    use std::time::Duration;

    struct StraightLineClient;

    #[async_trait]
    impl RouteClient for StraightLineClient {
        async fn route(&self, start: Location, end: Location) -> Result<RouteResponse, RouteError> {
            Ok(RouteResponse {
                points: vec![start.point(), end.point()],
                distance_km: start.distance_km(&end),
                duration_s: 0.0,
                fallback: false,
            })
        }
    }

    fn make_cache() -> RouteCache {
        RouteCache::new(
            StdArc::new(StraightLineClient),
            1024,
            Duration::from_secs(3600),
            1,
            Duration::from_secs(20),
            5.0,
            20,
        )
    }

    #[tokio::test]
    async fn tick_with_dt_zero_does_not_advance_progress() {
        let _ = NullAdvisorClient; // advisor unused by motion; included for symmetry with other agent tests
        let store = Store::new(500);
        let config = MotionConfig::default();
        let cache = make_cache();

        let now = Utc::now();
        let origin = Location::new(0.0, 0.0, None);
        let destination = Location::new(1.0, 1.0, None);
        store
            .insert_vehicle(Vehicle::new(VehicleId(0), "d", 20.0, origin, None, now))
            .await;
        store
            .insert_load(Load::new(LoadId(0), origin, destination, 5.0, 2.0, now, now, now))
            .await;
        let trip = Trip::new(TripId(0), VehicleId(0), LoadId(0), 0.0, 0.0, 0.0, 0.0, now);
        store.insert_trip(trip).await.unwrap();

        // First tick fetches the route (stays in planning).
        tick(&store, &cache, &config, 0, 0.0).await;
        // Second tick resolves planning -> next phase, still dt=0.
        tick(&store, &cache, &config, 1, 0.0).await;

        let snapshot = store.snapshot().await;
        let trip = &snapshot.trips[&TripId(0)];
        assert_eq!(trip.progress_percent, 0.0);
    }

    #[tokio::test]
    async fn repeated_ticks_increase_progress_until_completion() {
        let store = Store::new(500);
        let config = MotionConfig::default();
        let cache = make_cache();

        let now = Utc::now();
        let origin = Location::new(0.0, 0.0, None);
        let destination = Location::new(0.0, 1.0, None);
        store
            .insert_vehicle(Vehicle::new(VehicleId(0), "d", 20.0, origin, None, now))
            .await;
        store
            .insert_load(Load::new(LoadId(0), origin, destination, 5.0, 2.0, now, now, now))
            .await;
        let trip = Trip::new(TripId(0), VehicleId(0), LoadId(0), 0.0, 0.0, 0.0, 0.0, now);
        store.insert_trip(trip).await.unwrap();

        let mut last_progress = -1.0;
        for i in 0..400u64 {
            tick(&store, &cache, &config, i, 30.0).await;
            let snapshot = store.snapshot().await;
            if !snapshot.trips.contains_key(&TripId(0)) {
                break;
            }
            let progress = snapshot.trips[&TripId(0)].progress_percent;
            assert!(progress >= last_progress);
            last_progress = progress;
        }

        let snapshot = store.snapshot().await;
        assert!(!snapshot.trips.contains_key(&TripId(0)));
        let load = &snapshot.loads[&LoadId(0)];
        assert_eq!(load.status, LoadStatus::Delivered);
        let vehicle = &snapshot.vehicles[&VehicleId(0)];
        assert_eq!(vehicle.status, VehicleStatus::Idle);
        assert_eq!(vehicle.current_load_tons, 0.0);
    }
}

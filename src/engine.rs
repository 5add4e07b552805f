//! Engine composite and Dispatch Loop. One `Engine` owns the Store, the
//! Route Cache, the advisor client, and the resolved configuration; the
//! REST boundary and the background scheduler both hold it behind an
//! `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::advisor::{AdvisorClient, HttpAdvisorClient, NullAdvisorClient};
use crate::agents::{adapter, matcher, observer};
use crate::config::Config;
use crate::model::{Event, EventKind, Load, Location, Snapshot, Vehicle};
use crate::motion;
use crate::predictor::{self, Kpis, TripPrediction};
use crate::routing::{HttpRouteClient, NullRouteClient, RouteCache};
use crate::store::Store;

/// A fixed set of city coordinates vehicles and loads are scattered over
/// at initialization. Picked for rough continental US spread so
/// great-circle legs span a realistic range of distances.
const CITIES: &[(&str, f64, f64)] = &[
    ("Atlanta", 33.7490, -84.3880),
    ("Chicago", 41.8781, -87.6298),
    ("Dallas", 32.7767, -96.7970),
    ("Denver", 39.7392, -104.9903),
    ("Los Angeles", 34.0522, -118.2437),
    ("Memphis", 35.1495, -90.0490),
    ("New York", 40.7128, -74.0060),
    ("Phoenix", 33.4484, -112.0740),
    ("Seattle", 47.6062, -122.3321),
    ("Miami", 25.7617, -80.1918),
];

pub struct Engine {
    pub store: Store,
    pub route_cache: RouteCache,
    pub advisor: Arc<dyn AdvisorClient>,
    pub config: Config,
    motion_tick: AtomicU64,
}

impl Engine {
    pub fn new(config: Config) -> Arc<Self> {
        let route_client: Arc<dyn crate::routing::RouteClient> = match &config.route.url {
            Some(url) => Arc::new(HttpRouteClient::new(url.clone(), Duration::from_secs(config.route.timeout_s))),
            None => Arc::new(NullRouteClient),
        };
        let route_cache = RouteCache::new(
            route_client,
            config.route.cache_size,
            Duration::from_secs(config.route.cache_ttl_s),
            config.route.retries,
            Duration::from_secs(config.route.total_budget_s),
            config.route.fallback_spacing_km,
            config.route.fallback_min_points,
        );
        let advisor: Arc<dyn AdvisorClient> = match &config.advisor.url {
            Some(url) => Arc::new(HttpAdvisorClient::new(url.clone())),
            None => Arc::new(NullAdvisorClient),
        };

        Arc::new(Self {
            store: Store::new(config.events.ring_size),
            route_cache,
            advisor,
            config,
            motion_tick: AtomicU64::new(0),
        })
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.store.snapshot().await
    }

    pub fn predict(&self, snapshot: &Snapshot) -> Vec<TripPrediction> {
        predictor::predict(snapshot, &self.config)
    }

    pub fn kpis(&self, snapshot: &Snapshot) -> Kpis {
        predictor::kpis(snapshot)
    }

    /// `initialize({num_vehicles, num_loads}) -> counts created` (spec
    /// §6). Scatters vehicles and loads over [`CITIES`] with randomized
    /// jitter, capacity, rate, and windows.
    pub async fn initialize(&self, num_vehicles: usize, num_loads: usize) -> (usize, usize) {
        let now = Utc::now();
        let mut rng = rand::thread_rng();

        for i in 0..num_vehicles {
            let (name, lat, lng) = CITIES[i % CITIES.len()];
            let jitter_lat = rng.gen_range(-0.3..0.3);
            let jitter_lng = rng.gen_range(-0.3..0.3);
            let location = Location::new(
                (lat + jitter_lat).clamp(-90.0, 90.0),
                (lng + jitter_lng).clamp(-180.0, 180.0),
                Some(name),
            );
            let home_depot = Location::new(lat, lng, Some(name));
            let capacity_tons = rng.gen_range(10.0..25.0);
            let id = self.store.ids().next_vehicle();
            self.store
                .insert_vehicle(Vehicle::new(id, format!("driver-{i}"), capacity_tons, location, Some(home_depot), now))
                .await;
        }

        let mut load_events = Vec::with_capacity(num_loads);
        for _ in 0..num_loads {
            let origin_idx = rng.gen_range(0..CITIES.len());
            let mut destination_idx = rng.gen_range(0..CITIES.len());
            while destination_idx == origin_idx {
                destination_idx = rng.gen_range(0..CITIES.len());
            }
            let (origin_name, origin_lat, origin_lng) = CITIES[origin_idx];
            let (dest_name, dest_lat, dest_lng) = CITIES[destination_idx];
            let origin = Location::new(origin_lat, origin_lng, Some(origin_name));
            let destination = Location::new(dest_lat, dest_lng, Some(dest_name));

            let weight_tons = rng.gen_range(1.0..15.0);
            let rate_per_km = rng.gen_range(1.5..4.0);
            let pickup_window_start = now;
            let pickup_window_end = now + chrono::Duration::hours(rng.gen_range(2..8));
            let delivery_deadline = now + chrono::Duration::hours(rng.gen_range(12..48));

            let id = self.store.ids().next_load();
            let load = Load::new(id, origin, destination, weight_tons, rate_per_km, pickup_window_start, pickup_window_end, delivery_deadline);
            load_events.push(EventKind::LoadPosted {
                load_id: id,
                origin,
                destination,
                weight_tons,
                rate_per_km,
            });
            self.store.insert_load(load).await;
        }

        if !load_events.is_empty() {
            self.store.apply_events(load_events).await;
        }

        (num_vehicles, num_loads)
    }

    /// Runs the Observer agent once and applies its events. Callers may
    /// honor its triggers by running Matcher/Adapter inline; the
    /// background scheduler instead reacts to the same triggers on its
    /// own cadence.
    pub async fn cycle(&self) -> (Vec<Arc<Event>>, Vec<observer::Trigger>) {
        let snapshot = self.store.snapshot().await;
        let now = Utc::now();
        let output = observer::cycle(&snapshot, &self.config, now);

        let mut events = output.events;
        for draft in output.new_loads {
            let id = self.store.ids().next_load();
            let load = Load::new(
                id,
                draft.origin,
                draft.destination,
                draft.weight_tons,
                draft.rate_per_km,
                draft.pickup_window_start,
                draft.pickup_window_end,
                draft.delivery_deadline,
            );
            self.store.insert_load(load).await;
            events.push(EventKind::NewLoadPosted { load_id: id });
        }

        let applied = if events.is_empty() { Vec::new() } else { self.store.apply_events(events).await };
        (applied, output.triggers)
    }

    pub async fn match_loads(&self) -> matcher::MatchOutcome {
        let now = Utc::now();
        let (outcome, _events) = matcher::run(&self.store, &self.route_cache, self.advisor.as_ref(), &self.config, now).await;
        outcome
    }

    pub async fn manage_routes(&self) -> Vec<adapter::TripDecision> {
        let now = Utc::now();
        adapter::run(&self.store, self.advisor.as_ref(), &self.config, now).await
    }

    /// Runs one Motion tick and returns the Predictor's readout over the
    /// resulting snapshot, as the `simulate-movement` REST endpoint does.
    pub async fn simulate_movement(&self, dt_seconds: f64) -> Vec<TripPrediction> {
        let tick_index = self.motion_tick.fetch_add(1, Ordering::Relaxed);
        motion::tick(&self.store, &self.route_cache, &self.config.motion, tick_index, dt_seconds).await;
        let snapshot = self.store.snapshot().await;
        self.predict(&snapshot)
    }

    pub async fn vehicles(&self, status: Option<crate::model::VehicleStatus>) -> Vec<Arc<Vehicle>> {
        let snapshot = self.store.snapshot().await;
        snapshot
            .vehicles
            .values()
            .filter(|v| status.map(|s| v.status == s).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub async fn loads(&self, status: Option<crate::model::LoadStatus>) -> Vec<Arc<Load>> {
        let snapshot = self.store.snapshot().await;
        snapshot
            .loads
            .values()
            .filter(|l| status.map(|s| l.status == s).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub async fn events(&self, limit: usize, event_type: Option<&str>) -> Vec<Arc<Event>> {
        let snapshot = self.store.snapshot().await;
        snapshot
            .recent_events
            .iter()
            .rev()
            .filter(|e| event_type.map(|t| e.type_name() == t).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }

}

/// Spawns the four independent-cadence Dispatch Loop tasks. Each uses
/// `MissedTickBehavior::Skip` so a slow tick coalesces rather than
/// queues. `cancel` is a single shared signal; every task exits as soon
/// as it observes `true`.
pub fn spawn_dispatch_loop(engine: Arc<Engine>, cancel: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    handles.push(spawn_cadence(
        "motion",
        Duration::from_secs(engine.config.tick.period_motion_s),
        cancel.clone(),
        {
            let engine = engine.clone();
            move || {
                let engine = engine.clone();
                async move {
                    let dt = engine.config.tick.period_motion_s as f64;
                    let _ = engine.simulate_movement(dt).await;
                }
            }
        },
    ));

    handles.push(spawn_cadence(
        "observer",
        Duration::from_secs(engine.config.tick.period_observer_s),
        cancel.clone(),
        {
            let engine = engine.clone();
            move || {
                let engine = engine.clone();
                async move {
                    let _ = engine.cycle().await;
                }
            }
        },
    ));

    handles.push(spawn_cadence(
        "matcher",
        Duration::from_secs(engine.config.tick.period_matcher_s),
        cancel.clone(),
        {
            let engine = engine.clone();
            move || {
                let engine = engine.clone();
                async move {
                    let _ = engine.match_loads().await;
                }
            }
        },
    ));

    handles.push(spawn_cadence(
        "adapter",
        Duration::from_secs(engine.config.tick.period_adapter_s),
        cancel,
        {
            let engine = engine.clone();
            move || {
                let engine = engine.clone();
                async move {
                    let _ = engine.manage_routes().await;
                }
            }
        },
    ));

    handles
}

fn spawn_cadence<F, Fut>(name: &'static str, period: Duration, mut cancel: watch::Receiver<bool>, mut task: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tracing::debug!(task = name, "running cadence");
                    task().await;
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!(task = name, "dispatch loop task cancelled");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::model::{LoadStatus, Trip, TripId, TripPhase, VehicleStatus};

    fn test_config() -> Config {
        Config::default()
    }

    #[tokio::test]
    async fn scenario_1_initialize_seeds_idle_vehicles_and_available_loads() {
        let engine = Engine::new(test_config());
        engine.initialize(3, 4).await;

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.vehicles.len(), 3);
        assert!(snapshot.vehicles.values().all(|v| v.status == VehicleStatus::Idle));
        assert_eq!(snapshot.loads.len(), 4);
        assert!(snapshot.loads.values().all(|l| l.status == LoadStatus::Available));
        assert_eq!(snapshot.trips.len(), 0);

        let load_posted_count = snapshot
            .recent_events
            .iter()
            .filter(|e| e.type_name() == "load_posted")
            .count();
        assert!(load_posted_count >= 4);
    }

    #[tokio::test]
    async fn scenario_2_match_creates_feasible_trips() {
        let engine = Engine::new(test_config());
        engine.initialize(3, 4).await;

        let outcome = engine.match_loads().await;
        assert!(outcome.matches_created >= 1 && outcome.matches_created <= 3);

        let snapshot = engine.snapshot().await;
        for m in &outcome.approved_matches {
            let vehicle = &snapshot.vehicles[&m.vehicle_id];
            let load = &snapshot.loads[&m.load_id];
            assert!(vehicle.capacity_tons >= load.weight_tons);
            assert_eq!(load.status, LoadStatus::Matched);
            assert!(matches!(vehicle.status, VehicleStatus::EnRouteEmpty | VehicleStatus::EnRouteLoaded));
        }
    }

    #[tokio::test]
    async fn scenario_3_motion_advances_progress_without_violating_bounds() {
        let engine = Engine::new(test_config());
        engine.initialize(3, 4).await;
        engine.match_loads().await;

        let mut last_progress: std::collections::HashMap<_, f64> = std::collections::HashMap::new();
        for _ in 0..10 {
            engine.simulate_movement(60.0).await;
            let snapshot = engine.snapshot().await;
            for (id, trip) in &snapshot.trips {
                if let Some(&prev) = last_progress.get(id) {
                    assert!(trip.progress_percent >= prev);
                }
                last_progress.insert(*id, trip.progress_percent);
            }
            for vehicle in snapshot.vehicles.values() {
                assert!(vehicle.fuel_percent >= 0.0);
                assert!(vehicle.current_load_tons <= vehicle.capacity_tons);
            }
        }

        let snapshot = engine.snapshot().await;
        let position_events = snapshot
            .recent_events
            .iter()
            .filter(|e| e.type_name() == "vehicle_position_update")
            .count();
        assert!(position_events >= 1);
    }

    #[tokio::test]
    async fn scenario_4_traffic_alert_triggers_adjustment() {
        let engine = Engine::new(test_config());
        engine.initialize(2, 2).await;
        let outcome = engine.match_loads().await;
        if outcome.matches_created == 0 {
            // Economics didn't favor a match this random seed; nothing to adapt.
            return;
        }
        let vehicle_id = outcome.approved_matches[0].vehicle_id;

        engine
            .store
            .apply_events(vec![EventKind::TrafficAlert {
                vehicle_id,
                delay_minutes: 90.0,
                reason: "congestion".into(),
            }])
            .await;

        let decisions = engine.manage_routes().await;
        if let Some(decision) = decisions.iter().find(|d| d.vehicle_id == vehicle_id) {
            assert!(matches!(
                decision.decision,
                crate::agents::adapter::Decision::AdjustRoute | crate::agents::adapter::Decision::FollowUpLoad { .. }
            ));
        }
    }

    #[tokio::test]
    async fn scenario_5_followup_load_spawns_trip_with_matching_economics() {
        let engine = Engine::new(test_config());
        engine.initialize(1, 1).await;

        let snapshot = engine.snapshot().await;
        let vehicle_id = *snapshot.vehicles.keys().next().unwrap();
        let original_load_id = *snapshot.loads.keys().next().unwrap();

        let now = Utc::now();
        let followup_load_id = engine.store.ids().next_load();
        engine
            .store
            .insert_load(Load::new(
                followup_load_id,
                Location::new(10.0, 10.0, None),
                Location::new(11.0, 11.0, None),
                3.0,
                2.5,
                now,
                now + chrono::Duration::hours(6),
                now + chrono::Duration::hours(24),
            ))
            .await;

        let mut trip = Trip::new(TripId(0), vehicle_id, original_load_id, 0.0, 0.0, 100.0, 20.0, now);
        trip.phase = TripPhase::Unloading;
        trip.route = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.0)];
        trip.followup_load_id = Some(followup_load_id);
        trip.followup_empty_leg_km = 12.3;
        trip.followup_loaded_leg_km = 45.6;
        trip.followup_revenue = 300.0;
        trip.followup_cost = 80.0;
        engine.store.insert_trip(trip).await.unwrap();
        engine
            .store
            .update_vehicle(vehicle_id, |v| v.status = VehicleStatus::EnRouteLoaded)
            .await
            .unwrap();

        engine.simulate_movement(1.0).await;

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.trips.len(), 1);
        let followup_trip = snapshot.trips.values().next().unwrap();
        assert_eq!(followup_trip.load_id, followup_load_id);
        assert_eq!(followup_trip.vehicle_id, vehicle_id);
        assert!((followup_trip.empty_leg_km - 12.3).abs() < 1e-9);
        assert!((followup_trip.loaded_leg_km - 45.6).abs() < 1e-9);
        assert!((followup_trip.estimated_revenue - 300.0).abs() < 1e-9);
        assert!((followup_trip.estimated_fuel_cost - 80.0).abs() < 1e-9);

        let followup_load = &snapshot.loads[&followup_load_id];
        assert_eq!(followup_load.status, LoadStatus::Matched);
        assert_eq!(followup_load.assigned_vehicle_id, Some(vehicle_id));

        let original_load = &snapshot.loads[&original_load_id];
        assert_eq!(original_load.status, LoadStatus::Delivered);
    }

    #[tokio::test]
    async fn scenario_6_trip_completion_releases_vehicle() {
        let engine = Engine::new(test_config());
        engine.initialize(1, 1).await;
        let outcome = engine.match_loads().await;
        if outcome.matches_created == 0 {
            return;
        }

        for _ in 0..2000 {
            engine.simulate_movement(300.0).await;
            let snapshot = engine.snapshot().await;
            if snapshot.trips.is_empty() {
                break;
            }
        }

        let snapshot = engine.snapshot().await;
        assert!(snapshot.trips.is_empty());
        assert!(snapshot.loads.values().any(|l| l.status == LoadStatus::Delivered));
        let vehicle = snapshot.vehicles.values().next().unwrap();
        assert_eq!(vehicle.status, VehicleStatus::Idle);
        assert_eq!(vehicle.current_load_tons, 0.0);

        let completed = snapshot.recent_events.iter().any(|e| e.type_name() == "trip_completed");
        assert!(completed);
    }

    #[tokio::test]
    async fn running_matcher_twice_with_no_change_creates_no_new_trips() {
        let engine = Engine::new(test_config());
        engine.initialize(3, 4).await;
        engine.match_loads().await;
        let second = engine.match_loads().await;
        assert_eq!(second.matches_created, 0);
    }
}

//! Observer Agent: ingests external signals, writes events, and surfaces
//! triggers that let the Dispatch Loop run Matcher/Adapter ahead of their
//! periodic schedule.

use rand::Rng;

use crate::config::{Config, MotionConfig, ObserverConfig};
use crate::model::event::EventKind;
use crate::model::snapshot::Snapshot;
use crate::model::{Location, LoadStatus, VehicleStatus};

/// Internal markers directing the Dispatch Loop to run Matcher or Adapter
/// out of schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    IdleTimeout,
    NearDelivery,
    HighPriorityLoadPosted,
}

/// A new load the generator wants inserted. Carries no id: the caller
/// mints one from the Store's `IdGenerator` and turns this into a `Load`
/// plus a `new_load_posted` announcement.
#[derive(Debug, Clone)]
pub struct NewLoadDraft {
    pub origin: Location,
    pub destination: Location,
    pub weight_tons: f64,
    pub rate_per_km: f64,
    pub pickup_window_start: chrono::DateTime<chrono::Utc>,
    pub pickup_window_end: chrono::DateTime<chrono::Utc>,
    pub delivery_deadline: chrono::DateTime<chrono::Utc>,
}

pub struct ObserverOutput {
    pub events: Vec<EventKind>,
    pub triggers: Vec<Trigger>,
    pub new_loads: Vec<NewLoadDraft>,
}

/// `Cycle(snapshot) -> list of events + list of triggers`.
///
/// This implementation is wired to a stochastic generator standing in for
/// a real external signal feed; real deployments can swap it for one
/// without changing the contract.
pub fn cycle(snapshot: &Snapshot, config: &Config, now: chrono::DateTime<chrono::Utc>) -> ObserverOutput {
    let mut events = Vec::new();
    let mut triggers = Vec::new();
    let mut new_loads = Vec::new();

    detect_idle_timeouts(snapshot, &config.motion, now, &mut triggers);
    detect_near_delivery(snapshot, &config.observer, &mut triggers);
    detect_low_fuel(snapshot, config, &mut events);

    // Stochastic traffic signal: occasionally alert one vehicle on an
    // active leg, standing in for a real traffic-conditions feed.
    maybe_emit_traffic_alert(snapshot, &mut events);

    // Stochastic load-board signal: occasionally post a new load between
    // two points the fleet already operates near, standing in for a real
    // load-board feed.
    maybe_generate_load(snapshot, config, now, &mut new_loads, &mut triggers);

    ObserverOutput { events, triggers, new_loads }
}

fn detect_idle_timeouts(
    snapshot: &Snapshot,
    motion: &MotionConfig,
    now: chrono::DateTime<chrono::Utc>,
    triggers: &mut Vec<Trigger>,
) {
    let threshold = chrono::Duration::milliseconds((motion.idle_timeout_minutes * 60_000.0) as i64);
    let any_idle_timeout = snapshot.vehicles.values().any(|v| {
        v.status == VehicleStatus::Idle && now.signed_duration_since(v.last_activity_at) >= threshold
    });
    if any_idle_timeout {
        triggers.push(Trigger::IdleTimeout);
    }
}

fn detect_near_delivery(snapshot: &Snapshot, observer: &ObserverConfig, triggers: &mut Vec<Trigger>) {
    let any_near = snapshot
        .active_trips()
        .any(|t| t.progress_fraction() >= observer.near_delivery_progress);
    if any_near {
        triggers.push(Trigger::NearDelivery);
    }
}

fn detect_low_fuel(snapshot: &Snapshot, config: &Config, events: &mut Vec<EventKind>) {
    for vehicle in snapshot.vehicles.values() {
        if vehicle.fuel_percent < config.predictor.low_fuel_threshold_pct {
            events.push(EventKind::FuelLow {
                vehicle_id: vehicle.id,
                percent: vehicle.fuel_percent,
            });
        }
    }
}

fn maybe_emit_traffic_alert(snapshot: &Snapshot, events: &mut Vec<EventKind>) {
    let active: Vec<_> = snapshot
        .active_trips()
        .filter(|t| t.phase.is_terminal() == false)
        .collect();
    if active.is_empty() {
        return;
    }
    let mut rng = rand::thread_rng();
    // Low background rate; real deployments replace this generator with
    // an actual traffic-conditions feed.
    if rng.gen_bool(0.02) {
        let idx = rng.gen_range(0..active.len());
        let trip = active[idx];
        let delay_minutes = rng.gen_range(5.0..45.0);
        events.push(EventKind::TrafficAlert {
            vehicle_id: trip.vehicle_id,
            delay_minutes,
            reason: "traffic_conditions".to_string(),
        });
    }
}

fn maybe_generate_load(
    snapshot: &Snapshot,
    config: &Config,
    now: chrono::DateTime<chrono::Utc>,
    new_loads: &mut Vec<NewLoadDraft>,
    triggers: &mut Vec<Trigger>,
) {
    let anchors: Vec<Location> = snapshot.vehicles.values().map(|v| v.home_depot.unwrap_or(v.location)).collect();
    if anchors.len() < 2 {
        return;
    }
    let mut rng = rand::thread_rng();
    if !rng.gen_bool(config.observer.new_load_probability) {
        return;
    }

    let origin_idx = rng.gen_range(0..anchors.len());
    let mut destination_idx = rng.gen_range(0..anchors.len());
    while destination_idx == origin_idx {
        destination_idx = rng.gen_range(0..anchors.len());
    }
    let jitter = |l: &Location| {
        Location::new(
            (l.lat + rng.gen_range(-0.3..0.3)).clamp(-90.0, 90.0),
            (l.lng + rng.gen_range(-0.3..0.3)).clamp(-180.0, 180.0),
            l.name.as_deref(),
        )
    };
    let origin = jitter(&anchors[origin_idx]);
    let destination = jitter(&anchors[destination_idx]);
    let weight_tons = rng.gen_range(1.0..15.0);
    let rate_per_km = rng.gen_range(1.5..4.0);

    if is_high_priority_load(rate_per_km, config) {
        triggers.push(Trigger::HighPriorityLoadPosted);
    }

    new_loads.push(NewLoadDraft {
        origin,
        destination,
        weight_tons,
        rate_per_km,
        pickup_window_start: now,
        pickup_window_end: now + chrono::Duration::hours(rng.gen_range(2..8)),
        delivery_deadline: now + chrono::Duration::hours(rng.gen_range(12..48)),
    });
}

/// Flags a newly posted load as high-priority when its offered rate
/// exceeds the configured threshold.
pub fn is_high_priority_load(rate_per_km: f64, config: &Config) -> bool {
    rate_per_km >= config.matcher.high_priority_rate_threshold
}

pub fn load_status_allows_matching(status: LoadStatus) -> bool {
    status == LoadStatus::Available
}

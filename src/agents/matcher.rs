//! Matcher Agent: enumerates feasible vehicle/load pairings, scores them,
//! solicits an advisor ranking, parses its return, enforces uniqueness,
//! and instantiates trips.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::advisor::AdvisorClient;
use crate::agents::observer;
use crate::config::{Config, MatcherConfig};
use crate::model::{Event, EventKind, Load, LoadId, LoadStatus, Snapshot, Trip, VehicleId, VehicleStatus};
use crate::routing::RouteCache;
use crate::store::Store;

/// One feasible `(vehicle, load)` pairing with its computed economics.
#[derive(Debug, Clone)]
pub struct FeasibilityRecord {
    pub vehicle_id: VehicleId,
    pub load_id: LoadId,
    pub pickup_distance_km: f64,
    pub loaded_distance_km: f64,
    pub total_distance_km: f64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub profit_margin: f64,
    pub utilization: f64,
    pub estimated_hours: f64,
}

impl FeasibilityRecord {
    fn meets_targets(&self, config: &MatcherConfig) -> bool {
        self.profit_margin >= config.profit_margin_min && self.utilization >= config.utilization_min
    }
}

/// Enumerates every `(vehicle, load)` pair satisfying the feasibility
/// predicate and computes its economics. Pure function of a snapshot.
pub fn enumerate(snapshot: &Snapshot, config: &MatcherConfig, now: DateTime<Utc>) -> Vec<FeasibilityRecord> {
    let mut records = Vec::new();
    for vehicle in snapshot.vehicles.values() {
        if vehicle.status != VehicleStatus::Idle {
            continue;
        }
        for load in snapshot.loads.values() {
            if !observer::load_status_allows_matching(load.status) {
                continue;
            }
            if load.weight_tons > vehicle.capacity_tons {
                continue;
            }
            if now > load.pickup_window_end {
                continue;
            }

            let pickup_distance_km = vehicle.location.distance_km(&load.origin);
            let loaded_distance_km = load.distance_km;
            let total_distance_km = pickup_distance_km + loaded_distance_km;
            let revenue = load.rate_per_km * loaded_distance_km;
            let estimated_hours = if config.assumed_speed_kmh > 0.0 {
                total_distance_km / config.assumed_speed_kmh
            } else {
                0.0
            };
            let cost = config.cost_per_km * total_distance_km + config.cost_per_hour * estimated_hours;
            let profit = revenue - cost;
            let profit_margin = if revenue > 0.0 { profit / revenue } else { 0.0 };
            let utilization = if total_distance_km > 0.0 {
                loaded_distance_km / total_distance_km
            } else {
                0.0
            };

            records.push(FeasibilityRecord {
                vehicle_id: vehicle.id,
                load_id: load.id,
                pickup_distance_km,
                loaded_distance_km,
                total_distance_km,
                revenue,
                cost,
                profit,
                profit_margin,
                utilization,
                estimated_hours,
            });
        }
    }
    records
}

/// Builds the advisor prompt as a pure function of the top-K pairs and the
/// configured targets, kept unit-testable without a network call.
pub fn build_prompt(top: &[FeasibilityRecord], config: &MatcherConfig) -> (String, String) {
    let system = "You are a freight dispatch advisor. Approve vehicle-to-load matches that meet \
the given profit margin and utilization targets. Respond with one line per approved pair in the \
form `vehicle-id -> load-id`, and nothing else for unapproved pairs."
        .to_string();

    let mut user = format!(
        "Targets: profit margin >= {:.0}%, utilization >= {:.0}%.\nCandidate pairs:\n",
        config.profit_margin_min * 100.0,
        config.utilization_min * 100.0
    );
    for r in top {
        user.push_str(&format!(
            "{} -> {}: total_distance_km={:.1}, revenue={:.2}, profit={:.2}, profit_margin={:.1}%, utilization={:.1}%\n",
            r.vehicle_id,
            r.load_id,
            r.total_distance_km,
            r.revenue,
            r.profit,
            r.profit_margin * 100.0,
            r.utilization * 100.0
        ));
    }
    (system, user)
}

/// Parses advisor free text for `vehicle-id -> load-id` (or `→`) lines.
/// Only pairs present in `candidates` can be approved; a pair is approved
/// iff both identifiers occur on the same line with a
/// directional separator between them, candidate id on the left and
/// candidate id on the right of the separator.
pub fn parse_approved<'a>(text: &str, candidates: &'a [FeasibilityRecord]) -> Vec<&'a FeasibilityRecord> {
    let mut approved = Vec::new();
    for line in text.lines() {
        let Some((left, right)) = split_on_separator(line) else {
            continue;
        };
        for candidate in candidates {
            if approved.iter().any(|c: &&FeasibilityRecord| {
                c.vehicle_id == candidate.vehicle_id && c.load_id == candidate.load_id
            }) {
                continue;
            }
            let vehicle_tag = candidate.vehicle_id.to_string();
            let load_tag = candidate.load_id.to_string();
            if left.contains(&vehicle_tag) && right.contains(&load_tag) {
                approved.push(candidate);
            }
        }
    }
    approved
}

fn split_on_separator(line: &str) -> Option<(&str, &str)> {
    if let Some(idx) = line.find('\u{2192}') {
        return Some((&line[..idx], &line[idx + '\u{2192}'.len_utf8()..]));
    }
    line.find("->").map(|idx| (&line[..idx], &line[idx + 2..]))
}

/// Rule-based fallback: approve the top-scoring pair(s) whose metrics
/// satisfy both targets, up to `fallback_fanout`, sorted by profit margin
/// descending.
pub fn fallback_approve<'a>(sorted_by_margin: &'a [FeasibilityRecord], config: &MatcherConfig) -> Vec<&'a FeasibilityRecord> {
    sorted_by_margin
        .iter()
        .filter(|r| r.meets_targets(config))
        .take(config.fallback_fanout)
        .collect()
}

/// Outcome of one Matcher invocation, shaped for the `match-loads` REST
/// response.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct MatchOutcome {
    pub opportunities_analyzed: usize,
    pub matches_created: usize,
    pub approved_matches: Vec<ApprovedMatch>,
    pub advisor_reasoning: String,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct ApprovedMatch {
    pub vehicle_id: VehicleId,
    pub load_id: LoadId,
    pub profit_margin: f64,
    pub utilization: f64,
}

/// Runs one Matcher invocation: enumerate, rank, solicit the advisor,
/// enforce uniqueness, and atomically instantiate a trip per committed
/// pair.
pub async fn run(
    store: &Store,
    route_cache: &RouteCache,
    advisor: &dyn AdvisorClient,
    config: &Config,
    now: DateTime<Utc>,
) -> (MatchOutcome, Vec<std::sync::Arc<Event>>) {
    let snapshot = store.snapshot().await;
    let mut records = enumerate(&snapshot, &config.matcher, now);
    records.sort_by(|a, b| b.profit_margin.partial_cmp(&a.profit_margin).unwrap());
    let opportunities_analyzed = records.len();

    let top: Vec<FeasibilityRecord> = records.iter().take(config.matcher.top_k).cloned().collect();

    let (approved, advisor_reasoning) = if top.is_empty() {
        (Vec::new(), String::new())
    } else {
        let (system, user) = build_prompt(&top, &config.matcher);
        match advisor
            .complete(&system, &user, Duration::from_secs(config.matcher.timeout_s))
            .await
        {
            Ok(text) => {
                let parsed = parse_approved(&text, &top);
                if parsed.is_empty() {
                    // Unparseable output yields an empty approved set,
                    // not the rule-based fallback.
                    (Vec::new(), text)
                } else {
                    (parsed.into_iter().cloned().collect::<Vec<_>>(), text)
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "advisor call failed, using rule-based fallback");
                let fallback = fallback_approve(&top, &config.matcher);
                (
                    fallback.into_iter().cloned().collect::<Vec<_>>(),
                    format!("advisor unavailable ({err}); used rule-based fallback"),
                )
            }
        }
    };

    // Uniqueness pass: walk approved set in order, skip any pair whose
    // vehicle or load has already been committed in this invocation.
    let mut committed_vehicles = std::collections::HashSet::new();
    let mut committed_loads = std::collections::HashSet::new();
    let mut committed = Vec::new();
    for record in approved {
        if committed_vehicles.contains(&record.vehicle_id) || committed_loads.contains(&record.load_id) {
            continue;
        }
        committed_vehicles.insert(record.vehicle_id);
        committed_loads.insert(record.load_id);
        committed.push(record);
    }

    let mut approved_matches = Vec::new();
    let mut events = Vec::new();
    for record in &committed {
        if let Some(kinds) = instantiate_trip(store, route_cache, &snapshot, record, now).await {
            approved_matches.push(ApprovedMatch {
                vehicle_id: record.vehicle_id,
                load_id: record.load_id,
                profit_margin: record.profit_margin,
                utilization: record.utilization,
            });
            events.extend(kinds);
        }
    }

    let applied = if events.is_empty() {
        Vec::new()
    } else {
        store.apply_events(events).await
    };

    let matches_created = approved_matches.len();
    (
        MatchOutcome {
            opportunities_analyzed,
            matches_created,
            approved_matches,
            advisor_reasoning,
        },
        applied,
    )
}

/// Builds the trip for one committed pair and applies it atomically: route
/// legs fetched, trip inserted, load/vehicle updated, events returned for
/// the caller to apply in one batch. Returns `None` if the store rejects
/// the insert (a race with another writer); processing continues with the
/// next pair.
async fn instantiate_trip(
    store: &Store,
    route_cache: &RouteCache,
    snapshot: &Snapshot,
    record: &FeasibilityRecord,
    now: DateTime<Utc>,
) -> Option<Vec<EventKind>> {
    let vehicle = snapshot.vehicles.get(&record.vehicle_id)?;
    let load = snapshot.loads.get(&record.load_id)?;

    let pickup_leg = route_cache.route(vehicle.location, load.origin).await;
    let loaded_leg = route_cache.route(load.origin, load.destination).await;

    let mut route = pickup_leg.points.clone();
    route.extend(loaded_leg.points.iter().copied());
    let pickup_leg_points = pickup_leg.points.len();
    let route_total_km = pickup_leg.distance_km + loaded_leg.distance_km;

    let trip_id = store.ids().next_trip();
    let mut trip = Trip::new(
        trip_id,
        record.vehicle_id,
        record.load_id,
        pickup_leg.distance_km,
        loaded_leg.distance_km,
        record.revenue,
        record.cost,
        now,
    );
    trip.route = route;
    trip.route_total_km = route_total_km;
    trip.pickup_leg_points = pickup_leg_points;

    let zero_length_pickup = pickup_leg.distance_km < 1e-6;

    store.insert_trip(trip).await.ok()?;
    store
        .update_load(record.load_id, move |l: &mut Load| {
            l.status = LoadStatus::Matched;
            l.assigned_vehicle_id = Some(record.vehicle_id);
        })
        .await
        .ok()?;
    store
        .update_vehicle(record.vehicle_id, move |v| {
            v.status = if zero_length_pickup {
                VehicleStatus::EnRouteLoaded
            } else {
                VehicleStatus::EnRouteEmpty
            };
        })
        .await
        .ok()?;

    Some(vec![
        EventKind::LoadMatched {
            load_id: record.load_id,
            vehicle_id: record.vehicle_id,
        },
        EventKind::TripStarted {
            trip_id,
            vehicle_id: record.vehicle_id,
            load_id: record.load_id,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::NullAdvisorClient;
    use crate::model::{Location, Vehicle};
    use crate::routing::RouteCache;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    async fn seeded_store() -> Store {
        let store = Store::new(500);
        store
            .insert_vehicle(Vehicle::new(
                VehicleId(0),
                "driver-0",
                20.0,
                Location::new(0.0, 0.0, None),
                None,
                now(),
            ))
            .await;
        store
            .insert_load(Load::new(
                LoadId(0),
                Location::new(0.0, 0.0, None),
                Location::new(1.0, 1.0, None),
                5.0,
                10.0,
                now() - chrono::Duration::hours(1),
                now() + chrono::Duration::hours(6),
                now() + chrono::Duration::hours(12),
            ))
            .await;
        store
    }

    fn cache() -> RouteCache {
        RouteCache::new(
            Arc::new(crate::routing::HttpRouteClient::new(
                "http://localhost:0",
                StdDuration::from_millis(1),
            )),
            1024,
            StdDuration::from_secs(3600),
            0,
            StdDuration::from_millis(10),
            5.0,
            20,
        )
    }

    #[test]
    fn enumerate_skips_overweight_and_expired_pairs() {
        let config = Config::default();
        let mut snapshot_vehicles = std::collections::BTreeMap::new();
        snapshot_vehicles.insert(
            VehicleId(0),
            Arc::new(Vehicle::new(VehicleId(0), "d", 5.0, Location::new(0.0, 0.0, None), None, now())),
        );
        let mut loads = std::collections::BTreeMap::new();
        loads.insert(
            LoadId(0),
            Arc::new(Load::new(
                LoadId(0),
                Location::new(0.0, 0.0, None),
                Location::new(1.0, 1.0, None),
                10.0, // exceeds capacity
                2.0,
                now(),
                now() + chrono::Duration::hours(1),
                now() + chrono::Duration::hours(2),
            )),
        );
        let snapshot = Snapshot {
            snapshot_at: now(),
            vehicles: snapshot_vehicles,
            loads,
            trips: std::collections::BTreeMap::new(),
            recent_events: Vec::new(),
        };
        let records = enumerate(&snapshot, &config.matcher, now());
        assert!(records.is_empty());
    }

    #[test]
    fn parse_approved_reads_arrow_separated_ids() {
        let records = vec![FeasibilityRecord {
            vehicle_id: VehicleId(3),
            load_id: LoadId(7),
            pickup_distance_km: 1.0,
            loaded_distance_km: 1.0,
            total_distance_km: 2.0,
            revenue: 10.0,
            cost: 1.0,
            profit: 9.0,
            profit_margin: 0.9,
            utilization: 0.9,
            estimated_hours: 1.0,
        }];
        let text = "Approved: v-3 -> l-7\nSome other commentary";
        let approved = parse_approved(text, &records);
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].vehicle_id, VehicleId(3));
    }

    #[test]
    fn parse_approved_ignores_unlisted_pairs() {
        let records = vec![FeasibilityRecord {
            vehicle_id: VehicleId(3),
            load_id: LoadId(7),
            pickup_distance_km: 1.0,
            loaded_distance_km: 1.0,
            total_distance_km: 2.0,
            revenue: 10.0,
            cost: 1.0,
            profit: 9.0,
            profit_margin: 0.9,
            utilization: 0.9,
            estimated_hours: 1.0,
        }];
        let text = "v-9 -> l-1";
        assert!(parse_approved(text, &records).is_empty());
    }

    #[tokio::test]
    async fn fallback_used_when_advisor_unavailable() {
        let store = seeded_store().await;
        let cache = cache();
        let advisor = NullAdvisorClient;
        let config = Config::default();

        let (outcome, _events) = run(&store, &cache, &advisor, &config, now()).await;
        assert!(outcome.opportunities_analyzed >= 1);
        assert!(outcome.advisor_reasoning.contains("fallback"));
    }

    #[tokio::test]
    async fn expired_pickup_window_is_never_proposed() {
        let store = Store::new(500);
        store
            .insert_vehicle(Vehicle::new(VehicleId(0), "d", 20.0, Location::new(0.0, 0.0, None), None, now()))
            .await;
        store
            .insert_load(Load::new(
                LoadId(0),
                Location::new(0.0, 0.0, None),
                Location::new(1.0, 1.0, None),
                5.0,
                10.0,
                now() - chrono::Duration::hours(6),
                now() - chrono::Duration::hours(1), // window already closed
                now() + chrono::Duration::hours(12),
            ))
            .await;
        let snapshot = store.snapshot().await;
        let records = enumerate(&snapshot, &Config::default().matcher, now());
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn second_run_with_no_state_change_creates_no_new_trips() {
        let store = seeded_store().await;
        let cache = cache();
        let advisor = NullAdvisorClient;
        let config = Config::default();

        let (first, _) = run(&store, &cache, &advisor, &config, now()).await;
        assert!(first.matches_created >= 1);

        let (second, _) = run(&store, &cache, &advisor, &config, now()).await;
        assert_eq!(second.matches_created, 0);
    }
}

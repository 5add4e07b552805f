//! Adapter Agent: for each in-flight trip, detects disturbances, searches
//! for follow-up load opportunities near the current destination, solicits
//! an advisor decision, and applies `CONTINUE`, `ADJUST_ROUTE`, or
//! `FOLLOW_UP_LOAD`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::advisor::AdvisorClient;
use crate::config::{AdapterConfig, Config};
use crate::model::event::EventKind;
use crate::model::{LoadId, LoadStatus, Snapshot, Trip, TripId, TripPhase, VehicleId};
use crate::store::Store;

/// Per-trip disturbance summary.
#[derive(Debug, Clone, Default)]
pub struct Situation {
    pub total_delay_minutes: f64,
    pub fuel_low: bool,
    pub driver_hours_low: bool,
}

fn detect_situation(snapshot: &Snapshot, vehicle_id: VehicleId) -> Situation {
    let mut situation = Situation::default();
    for event in &snapshot.recent_events {
        match &event.kind {
            EventKind::TrafficAlert { vehicle_id: v, delay_minutes, .. } if *v == vehicle_id => {
                situation.total_delay_minutes += delay_minutes;
            }
            EventKind::FuelLow { vehicle_id: v, .. } if *v == vehicle_id => {
                situation.fuel_low = true;
            }
            _ => {}
        }
    }
    if let Some(vehicle) = snapshot.vehicles.get(&vehicle_id) {
        situation.driver_hours_low = vehicle.driving_hours_remaining < 1.0;
    }
    situation
}

/// A candidate follow-up load near the trip's destination.
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub load_id: LoadId,
    pub detour_distance_km: f64,
    pub new_loaded_distance_km: f64,
    pub cost: f64,
    pub revenue: f64,
    pub profit: f64,
    pub profit_margin: f64,
}

fn search_opportunities(snapshot: &Snapshot, trip: &Trip, config: &AdapterConfig, matcher_cfg: &crate::config::MatcherConfig) -> Vec<Opportunity> {
    let Some(load) = snapshot.loads.get(&trip.load_id) else {
        return Vec::new();
    };
    let destination = load.destination;

    let mut opportunities: Vec<Opportunity> = snapshot
        .loads
        .values()
        .filter(|l| l.status == LoadStatus::Available)
        .filter_map(|candidate| {
            let detour_distance_km = destination.distance_km(&candidate.origin);
            if detour_distance_km > config.detour_budget_km {
                return None;
            }
            let new_loaded_distance_km = candidate.distance_km;
            let total_distance_km = detour_distance_km + new_loaded_distance_km;
            let estimated_hours = if matcher_cfg.assumed_speed_kmh > 0.0 {
                total_distance_km / matcher_cfg.assumed_speed_kmh
            } else {
                0.0
            };
            let cost = matcher_cfg.cost_per_km * total_distance_km + matcher_cfg.cost_per_hour * estimated_hours;
            let revenue = candidate.rate_per_km * new_loaded_distance_km;
            let profit = revenue - cost;
            if profit <= 0.0 {
                return None;
            }
            let profit_margin = if revenue > 0.0 { profit / revenue } else { 0.0 };
            Some(Opportunity {
                load_id: candidate.id,
                detour_distance_km,
                new_loaded_distance_km,
                cost,
                revenue,
                profit,
                profit_margin,
            })
        })
        .collect();

    opportunities.sort_by(|a, b| b.profit.partial_cmp(&a.profit).unwrap());
    opportunities.truncate(config.opportunities_top_m);
    opportunities
}

/// The three decisions available to the Adapter.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Continue,
    AdjustRoute,
    FollowUpLoad { load_id: LoadId },
}

fn build_prompt(situation: &Situation, opportunities: &[Opportunity]) -> (String, String) {
    let system = "You are a freight dispatch advisor managing an in-flight trip. Reply with a \
first line of the exact form `DECISION: CONTINUE`, `DECISION: ADJUST_ROUTE`, or \
`DECISION: FOLLOW_UP_LOAD <load-id>`."
        .to_string();

    let mut user = format!(
        "Situation: total_delay_minutes={:.0}, fuel_low={}, driver_hours_low={}.\nOpportunities:\n",
        situation.total_delay_minutes, situation.fuel_low, situation.driver_hours_low
    );
    for o in opportunities {
        user.push_str(&format!(
            "{}: detour_km={:.1}, profit={:.2}, profit_margin={:.1}%\n",
            o.load_id,
            o.detour_distance_km,
            o.profit,
            o.profit_margin * 100.0
        ));
    }
    (system, user)
}

/// Parses advisor text for a leading `DECISION:` token. Returns `None` on
/// parse failure.
fn parse_decision(text: &str, opportunities: &[Opportunity]) -> Option<Decision> {
    let first_line = text.lines().find(|l| l.contains("DECISION:"))?;
    let after = first_line.split("DECISION:").nth(1)?.trim();
    if after.starts_with("CONTINUE") {
        return Some(Decision::Continue);
    }
    if after.starts_with("ADJUST_ROUTE") {
        return Some(Decision::AdjustRoute);
    }
    if after.starts_with("FOLLOW_UP_LOAD") {
        let tag = after.strip_prefix("FOLLOW_UP_LOAD").unwrap_or("").trim();
        if let Some(opportunity) = opportunities.iter().find(|o| tag.contains(&o.load_id.to_string())) {
            return Some(Decision::FollowUpLoad { load_id: opportunity.load_id });
        }
        return None;
    }
    None
}

/// Rule-based fallback: high delay with a strong opportunity triggers a
/// follow-up load; any positive delay adjusts the route; otherwise
/// continue.
fn fallback_decision(situation: &Situation, opportunities: &[Opportunity], config: &AdapterConfig) -> Decision {
    if situation.total_delay_minutes >= config.followup_delay_threshold_min {
        if let Some(top) = opportunities.first() {
            if top.profit_margin >= config.followup_margin_min {
                return Decision::FollowUpLoad { load_id: top.load_id };
            }
        }
    }
    if situation.total_delay_minutes > 0.0 {
        return Decision::AdjustRoute;
    }
    Decision::Continue
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TripDecision {
    pub trip_id: TripId,
    pub vehicle_id: VehicleId,
    pub decision: Decision,
    pub reasoning: String,
}

/// Runs one Adapter invocation over every trip in `en_route_to_pickup` or
/// `in_transit`, applying each trip's decision atomically.
pub async fn run(store: &Store, advisor: &dyn AdvisorClient, config: &Config, _now: DateTime<Utc>) -> Vec<TripDecision> {
    let snapshot = store.snapshot().await;
    let mut trip_ids: Vec<TripId> = snapshot
        .trips
        .values()
        .filter(|t| matches!(t.phase, TripPhase::EnRouteToPickup | TripPhase::InTransit))
        .map(|t| t.id)
        .collect();
    trip_ids.sort();

    let mut decisions = Vec::new();
    for trip_id in trip_ids {
        let Some(trip) = snapshot.trips.get(&trip_id) else { continue };
        let situation = detect_situation(&snapshot, trip.vehicle_id);
        let opportunities = search_opportunities(&snapshot, trip, &config.adapter, &config.matcher);

        let (decision, reasoning) = resolve_decision(advisor, &config.adapter, &situation, &opportunities).await;
        apply_decision(store, trip_id, &decision, &opportunities).await;

        decisions.push(TripDecision {
            trip_id,
            vehicle_id: trip.vehicle_id,
            decision,
            reasoning,
        });
    }
    decisions
}

async fn resolve_decision(
    advisor: &dyn AdvisorClient,
    config: &AdapterConfig,
    situation: &Situation,
    opportunities: &[Opportunity],
) -> (Decision, String) {
    let (system, user) = build_prompt(situation, opportunities);
    match advisor.complete(&system, &user, Duration::from_secs(config.timeout_s)).await {
        Ok(text) => match parse_decision(&text, opportunities) {
            Some(decision) => (decision, text),
            None => (
                fallback_decision(situation, opportunities, config),
                format!("advisor response unparseable; used rule-based fallback: {text}"),
            ),
        },
        Err(err) => (
            fallback_decision(situation, opportunities, config),
            format!("advisor unavailable ({err}); used rule-based fallback"),
        ),
    }
}

async fn apply_decision(store: &Store, trip_id: TripId, decision: &Decision, opportunities: &[Opportunity]) {
    match decision {
        Decision::Continue => {
            // No state change; an info event would be emitted by the
            // caller's batch if the boundary chooses to surface it.
        }
        Decision::AdjustRoute => {
            let _ = store
                .update_trip(trip_id, |t| {
                    // Force Motion to re-fetch the remaining leg on its
                    // next tick and account for the observed delay.
                    t.route.clear();
                    t.delay_minutes += 30.0;
                })
                .await;
        }
        Decision::FollowUpLoad { load_id } => {
            let load_id = *load_id;
            let opportunity = opportunities.iter().find(|o| o.load_id == load_id).cloned();
            let _ = store
                .update_trip(trip_id, move |t| {
                    t.followup_load_id = Some(load_id);
                    if let Some(o) = opportunity {
                        t.followup_empty_leg_km = o.detour_distance_km;
                        t.followup_loaded_leg_km = o.new_loaded_distance_km;
                        t.followup_revenue = o.revenue;
                        t.followup_cost = o.cost;
                    }
                })
                .await;
            // Reserve the load immediately so Matcher's `status ==
            // Available` filter can't hand it to another vehicle before
            // the original trip reaches it.
            let _ = store
                .update_load(load_id, move |l| l.status = LoadStatus::Matched)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::NullAdvisorClient;
    use crate::model::{Load, Location, Trip, Vehicle, VehicleId};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    async fn in_transit_store() -> Store {
        let store = Store::new(500);
        let origin = Location::new(0.0, 0.0, None);
        let destination = Location::new(1.0, 1.0, None);
        store
            .insert_vehicle(Vehicle::new(VehicleId(0), "d", 20.0, destination, None, now()))
            .await;
        store
            .insert_load(Load::new(LoadId(0), origin, destination, 5.0, 2.0, now(), now(), now() + chrono::Duration::hours(6)))
            .await;
        let mut trip = Trip::new(TripId(0), VehicleId(0), LoadId(0), 0.0, 100.0, 200.0, 40.0, now());
        trip.phase = TripPhase::InTransit;
        trip.route_total_km = 100.0;
        trip.progress_percent = 50.0;
        store.insert_trip(trip).await.unwrap();
        store
    }

    #[tokio::test]
    async fn traffic_delay_triggers_adjust_or_followup() {
        let store = in_transit_store().await;
        store
            .apply_events(vec![EventKind::TrafficAlert {
                vehicle_id: VehicleId(0),
                delay_minutes: 90.0,
                reason: "congestion".into(),
            }])
            .await;

        let advisor = NullAdvisorClient;
        let config = Config::default();
        let decisions = run(&store, &advisor, &config, now()).await;
        assert_eq!(decisions.len(), 1);
        assert!(matches!(decisions[0].decision, Decision::AdjustRoute | Decision::FollowUpLoad { .. }));
    }

    #[tokio::test]
    async fn no_disturbance_continues() {
        let store = in_transit_store().await;
        let advisor = NullAdvisorClient;
        let config = Config::default();
        let decisions = run(&store, &advisor, &config, now()).await;
        assert_eq!(decisions[0].decision, Decision::Continue);
    }

    #[test]
    fn parse_decision_reads_leading_token() {
        let opportunities = Vec::new();
        assert_eq!(parse_decision("DECISION: CONTINUE", &opportunities), Some(Decision::Continue));
        assert_eq!(parse_decision("noise\nDECISION: ADJUST_ROUTE\nmore", &opportunities), Some(Decision::AdjustRoute));
        assert_eq!(parse_decision("garbage text", &opportunities), None);
    }

    #[test]
    fn followup_opportunity_within_budget_is_found() {
        let origin = Location::new(0.0, 0.0, None);
        let destination = Location::new(1.0, 1.0, None); // ~157km away from origin
        let mut trip = Trip::new(TripId(0), VehicleId(0), LoadId(0), 0.0, 100.0, 200.0, 40.0, now());
        trip.phase = TripPhase::InTransit;

        let mut loads = BTreeMap::new();
        loads.insert(
            LoadId(0),
            Arc::new(Load::new(LoadId(0), origin, destination, 5.0, 2.0, now(), now(), now())),
        );
        // Candidate follow-up load originates near the destination.
        let nearby_origin = Location::new(1.01, 1.01, None);
        loads.insert(
            LoadId(1),
            Arc::new(Load::new(LoadId(1), nearby_origin, Location::new(2.0, 2.0, None), 5.0, 5.0, now(), now() + chrono::Duration::hours(6), now() + chrono::Duration::hours(12))),
        );

        let snapshot = Snapshot {
            snapshot_at: now(),
            vehicles: BTreeMap::new(),
            loads,
            trips: BTreeMap::new(),
            recent_events: Vec::new(),
        };
        let config = Config::default();
        let opportunities = search_opportunities(&snapshot, &trip, &config.adapter, &config.matcher);
        assert!(opportunities.iter().any(|o| o.load_id == LoadId(1)));
    }
}

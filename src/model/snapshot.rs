use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::event::Event;
use super::ids::{LoadId, TripId, VehicleId};
use super::load::Load;
use super::trip::Trip;
use super::vehicle::Vehicle;

/// A read-only, internally consistent view of the Store at an instant.
/// Entities are reference-counted so snapshots share storage with the
/// live maps and with each other; a reader may retain one indefinitely
/// without synchronizing against future writes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Snapshot {
    pub snapshot_at: DateTime<Utc>,
    pub vehicles: BTreeMap<VehicleId, Arc<Vehicle>>,
    pub loads: BTreeMap<LoadId, Arc<Load>>,
    pub trips: BTreeMap<TripId, Arc<Trip>>,
    pub recent_events: Vec<Arc<Event>>,
}

impl Snapshot {
    pub fn active_trips(&self) -> impl Iterator<Item = &Arc<Trip>> {
        self.trips.values().filter(|t| !t.phase.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_json_is_equal_in_shape() {
        let snapshot = Snapshot {
            snapshot_at: Utc::now(),
            vehicles: BTreeMap::new(),
            loads: BTreeMap::new(),
            trips: BTreeMap::new(),
            recent_events: Vec::new(),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.snapshot_at, snapshot.snapshot_at);
        assert_eq!(restored.vehicles.len(), snapshot.vehicles.len());
    }
}

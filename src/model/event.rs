use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{EventId, LoadId, TripId, VehicleId};
use super::location::Location;

/// Closed event-type enumeration, a tagged variant in place of a
/// loosely-typed payload dictionary — emission and parsing become total
/// functions over this enum.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventKind {
    VehiclePositionUpdate {
        vehicle_id: VehicleId,
        lat: f64,
        lng: f64,
    },
    LoadPosted {
        load_id: LoadId,
        origin: Location,
        destination: Location,
        weight_tons: f64,
        rate_per_km: f64,
    },
    LoadMatched {
        load_id: LoadId,
        vehicle_id: VehicleId,
    },
    TripStarted {
        trip_id: TripId,
        vehicle_id: VehicleId,
        load_id: LoadId,
    },
    TripCompleted {
        trip_id: TripId,
    },
    TrafficAlert {
        vehicle_id: VehicleId,
        delay_minutes: f64,
        reason: String,
    },
    DeliveryDelay {
        trip_id: TripId,
        delay_minutes: f64,
        reason: String,
    },
    FuelLow {
        vehicle_id: VehicleId,
        percent: f64,
    },
    MaintenanceRequired {
        vehicle_id: VehicleId,
        reason: String,
    },
    NewLoadPosted {
        load_id: LoadId,
    },
    DriverRestRequired {
        vehicle_id: VehicleId,
    },
    /// Internal diagnostic emitted when Observer swallows a
    /// signal-ingestion failure, or when an `Invariant` error aborts a
    /// tick.
    InternalError {
        message: String,
    },
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::VehiclePositionUpdate { .. } => "vehicle_position_update",
            EventKind::LoadPosted { .. } => "load_posted",
            EventKind::LoadMatched { .. } => "load_matched",
            EventKind::TripStarted { .. } => "trip_started",
            EventKind::TripCompleted { .. } => "trip_completed",
            EventKind::TrafficAlert { .. } => "traffic_alert",
            EventKind::DeliveryDelay { .. } => "delivery_delay",
            EventKind::FuelLow { .. } => "fuel_low",
            EventKind::MaintenanceRequired { .. } => "maintenance_required",
            EventKind::NewLoadPosted { .. } => "new_load_posted",
            EventKind::DriverRestRequired { .. } => "driver_rest_required",
            EventKind::InternalError { .. } => "internal_error",
        }
    }
}

/// A single, append-only record in the Store's bounded event ring.
/// Timestamps are monotonically non-decreasing; `seq` totally orders
/// events emitted within the same tick.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Event {
    pub id: EventId,
    pub at: DateTime<Utc>,
    pub seq: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_name_matches_variant() {
        let k = EventKind::FuelLow {
            vehicle_id: VehicleId(1),
            percent: 8.0,
        };
        assert_eq!(k.type_name(), "fuel_low");
    }

    #[test]
    fn event_serializes_with_flattened_tag() {
        let e = Event {
            id: EventId(0),
            at: Utc::now(),
            seq: 0,
            kind: EventKind::TripCompleted { trip_id: TripId(2) },
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["event_type"], "trip_completed");
        assert_eq!(json["trip_id"], 2);
    }
}

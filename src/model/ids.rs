//! Typed entity identifiers. Each id wraps a `u64` counter value so that
//! vehicles, loads, trips, and events can never be confused for one
//! another at a call site, the way a bare `String`/`u64` id could be.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! typed_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn new(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }
    };
}

typed_id!(VehicleId, "v");
typed_id!(LoadId, "l");
typed_id!(TripId, "t");
typed_id!(EventId, "e");

/// Monotonic id generators, one counter per entity kind. Lives on the
/// [`crate::store::Store`] and is shared via `Arc`.
#[derive(Debug, Default)]
pub struct IdGenerator {
    vehicle: AtomicU64,
    load: AtomicU64,
    trip: AtomicU64,
    event: AtomicU64,
}

impl IdGenerator {
    pub fn next_vehicle(&self) -> VehicleId {
        VehicleId(self.vehicle.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_load(&self) -> LoadId {
        LoadId(self.load.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_trip(&self) -> TripId {
        TripId(self.trip.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_event(&self) -> EventId {
        EventId(self.event.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(VehicleId(3).to_string(), "v-3");
        assert_eq!(LoadId(7).to_string(), "l-7");
    }

    #[test]
    fn generator_increments_independently() {
        let gen = IdGenerator::default();
        assert_eq!(gen.next_vehicle(), VehicleId(0));
        assert_eq!(gen.next_vehicle(), VehicleId(1));
        assert_eq!(gen.next_load(), LoadId(0));
        assert_eq!(gen.next_trip(), TripId(0));
    }
}

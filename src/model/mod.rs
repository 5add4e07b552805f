pub mod event;
pub mod ids;
pub mod load;
pub mod location;
pub mod snapshot;
pub mod trip;
pub mod vehicle;

pub use event::{Event, EventKind};
pub use ids::{EventId, IdGenerator, LoadId, TripId, VehicleId};
pub use load::{Load, LoadStatus};
pub use location::Location;
pub use snapshot::Snapshot;
pub use trip::{Trip, TripPhase};
pub use vehicle::{Vehicle, VehicleStatus};

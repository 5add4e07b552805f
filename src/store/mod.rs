//! The authoritative in-memory state store. Vehicles, loads, and trips
//! live in `HashMap`s guarded by one `RwLock` — one coarse-grained write
//! lock, cheap snapshot reads.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{DispatchError, DispatchResult};
use crate::model::{
    Event, EventKind, IdGenerator, Load, LoadId, Snapshot, Trip, TripId, Vehicle, VehicleId,
};

struct StoreInner {
    vehicles: HashMap<VehicleId, Arc<Vehicle>>,
    loads: HashMap<LoadId, Arc<Load>>,
    trips: HashMap<TripId, Arc<Trip>>,
    events: VecDeque<Arc<Event>>,
}

pub struct Store {
    inner: RwLock<StoreInner>,
    ids: IdGenerator,
    ring_size: usize,
    seq: AtomicU64,
}

impl Store {
    pub fn new(ring_size: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                vehicles: HashMap::new(),
                loads: HashMap::new(),
                trips: HashMap::new(),
                events: VecDeque::new(),
            }),
            ids: IdGenerator::default(),
            ring_size,
            seq: AtomicU64::new(0),
        }
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Point-in-time consistent view across all collections. Entities are
    /// `Arc`-shared with the live maps, so the caller may retain the
    /// snapshot without synchronizing against future writes.
    pub async fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read().await;
        Snapshot {
            snapshot_at: Utc::now(),
            vehicles: inner.vehicles.iter().map(|(k, v)| (*k, v.clone())).collect(),
            loads: inner.loads.iter().map(|(k, v)| (*k, v.clone())).collect(),
            trips: inner.trips.iter().map(|(k, v)| (*k, v.clone())).collect(),
            recent_events: inner.events.iter().cloned().collect(),
        }
    }

    pub async fn insert_vehicle(&self, vehicle: Vehicle) {
        let mut inner = self.inner.write().await;
        inner.vehicles.insert(vehicle.id, Arc::new(vehicle));
    }

    pub async fn insert_load(&self, load: Load) {
        let mut inner = self.inner.write().await;
        inner.loads.insert(load.id, Arc::new(load));
    }

    pub async fn update_vehicle<F>(&self, id: VehicleId, mutator: F) -> DispatchResult<()>
    where
        F: FnOnce(&mut Vehicle),
    {
        let mut inner = self.inner.write().await;
        match inner.vehicles.get(&id) {
            Some(current) => {
                let mut updated = (**current).clone();
                mutator(&mut updated);
                inner.vehicles.insert(id, Arc::new(updated));
                Ok(())
            }
            None => Err(DispatchError::NotFound(format!("vehicle {id}"))),
        }
    }

    pub async fn update_load<F>(&self, id: LoadId, mutator: F) -> DispatchResult<()>
    where
        F: FnOnce(&mut Load),
    {
        let mut inner = self.inner.write().await;
        match inner.loads.get(&id) {
            Some(current) => {
                let mut updated = (**current).clone();
                mutator(&mut updated);
                inner.loads.insert(id, Arc::new(updated));
                Ok(())
            }
            None => Err(DispatchError::NotFound(format!("load {id}"))),
        }
    }

    /// Inserts a new trip. Conflicts when the vehicle or load already
    /// references another active (non-terminal) trip.
    pub async fn insert_trip(&self, trip: Trip) -> DispatchResult<()> {
        let mut inner = self.inner.write().await;
        let vehicle_busy = inner
            .trips
            .values()
            .any(|t| t.vehicle_id == trip.vehicle_id && !t.phase.is_terminal());
        let load_busy = inner
            .trips
            .values()
            .any(|t| t.load_id == trip.load_id && !t.phase.is_terminal());
        if vehicle_busy {
            return Err(DispatchError::Conflict(format!(
                "vehicle {} already has an active trip",
                trip.vehicle_id
            )));
        }
        if load_busy {
            return Err(DispatchError::Conflict(format!(
                "load {} already has an active trip",
                trip.load_id
            )));
        }
        inner.trips.insert(trip.id, Arc::new(trip));
        Ok(())
    }

    pub async fn update_trip<F>(&self, id: TripId, mutator: F) -> DispatchResult<()>
    where
        F: FnOnce(&mut Trip),
    {
        let mut inner = self.inner.write().await;
        match inner.trips.get(&id) {
            Some(current) => {
                let mut updated = (**current).clone();
                mutator(&mut updated);
                inner.trips.insert(id, Arc::new(updated));
                Ok(())
            }
            None => Err(DispatchError::NotFound(format!("trip {id}"))),
        }
    }

    pub async fn remove_trip(&self, id: TripId) -> DispatchResult<()> {
        let mut inner = self.inner.write().await;
        match inner.trips.remove(&id) {
            Some(_) => Ok(()),
            None => Err(DispatchError::NotFound(format!("trip {id}"))),
        }
    }

    /// Appends events, stamping each with a fresh id, the current time, and
    /// a monotonically increasing sequence number; drops the oldest entry
    /// on ring overflow.
    pub async fn apply_events(&self, kinds: Vec<EventKind>) -> Vec<Arc<Event>> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut applied = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let event = Arc::new(Event {
                id: self.ids.next_event(),
                at: now,
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
                kind,
            });
            inner.events.push_back(event.clone());
            while inner.events.len() > self.ring_size {
                inner.events.pop_front();
            }
            applied.push(event);
        }
        applied
    }
}

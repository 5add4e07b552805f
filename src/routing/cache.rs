//! Route Cache: keyed by rounded endpoint pairs, size-bounded LRU
//! eviction, TTL expiry, single-flight collapsing of concurrent misses
//! for the same key, and an always-succeeding public contract — on any
//! failure of the underlying [`RouteClient`] it substitutes a synthetic
//! fallback polyline rather than returning an error.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, warn};

use crate::geo::{fallback_polyline, polyline_length_km};
use crate::model::Location;

use super::client::{RouteClient, RouteResponse};

type CacheKey = (i64, i64, i64, i64);

fn round_key(value: f64) -> i64 {
    (value * 1000.0).round() as i64
}

fn cache_key(start: Location, end: Location) -> CacheKey {
    (
        round_key(start.lat),
        round_key(start.lng),
        round_key(end.lat),
        round_key(end.lng),
    )
}

struct CacheEntry {
    response: RouteResponse,
    inserted_at: Instant,
}

pub struct RouteCache {
    client: Arc<dyn RouteClient>,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    /// Most-recently-used order, back is most recent. Guarded separately
    /// from `entries` since eviction bookkeeping only needs key ordering.
    order: Mutex<VecDeque<CacheKey>>,
    in_flight: Mutex<HashMap<CacheKey, Arc<Notify>>>,
    capacity: usize,
    ttl: Duration,
    retries: u32,
    total_budget: Duration,
    fallback_spacing_km: f64,
    fallback_min_points: usize,
}

impl RouteCache {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn RouteClient>,
        capacity: usize,
        ttl: Duration,
        retries: u32,
        total_budget: Duration,
        fallback_spacing_km: f64,
        fallback_min_points: usize,
    ) -> Self {
        Self {
            client,
            entries: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(HashMap::new()),
            capacity,
            ttl,
            retries,
            total_budget,
            fallback_spacing_km,
            fallback_min_points,
        }
    }

    /// `Route(start, end) -> Polyline`. Never fails; the result's
    /// `fallback` flag tells the caller whether it was synthesized.
    pub async fn route(&self, start: Location, end: Location) -> RouteResponse {
        let key = cache_key(start, end);

        if let Some(resp) = self.get_fresh(&key).await {
            return resp;
        }

        let wait_for = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(notify) = in_flight.get(&key) {
                Some(notify.clone())
            } else {
                in_flight.insert(key, Arc::new(Notify::new()));
                None
            }
        };

        if let Some(notify) = wait_for {
            notify.notified().await;
            if let Some(resp) = self.get_fresh(&key).await {
                return resp;
            }
            // Leader finished but we raced the eviction/TTL window; fall
            // through and perform our own fetch rather than stall.
        }

        let response = self.fetch_with_fallback(start, end).await;
        self.insert(key, response.clone()).await;

        let mut in_flight = self.in_flight.lock().await;
        if let Some(notify) = in_flight.remove(&key) {
            notify.notify_waiters();
        }

        response
    }

    async fn get_fresh(&self, key: &CacheKey) -> Option<RouteResponse> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.response.clone())
    }

    async fn fetch_with_fallback(&self, start: Location, end: Location) -> RouteResponse {
        let deadline = Instant::now() + self.total_budget;
        let attempts = self.retries + 1;

        for attempt in 0..attempts {
            if Instant::now() >= deadline {
                break;
            }
            match self.client.route(start, end).await {
                Ok(resp) => return resp,
                Err(err) => {
                    warn!(attempt, error = %err, "route client call failed, retrying or falling back");
                }
            }
        }

        debug!("substituting fallback polyline for route request");
        let start_pt = start.point();
        let end_pt = end.point();
        let points = fallback_polyline(start_pt, end_pt, self.fallback_spacing_km, self.fallback_min_points);
        let distance_km = polyline_length_km(&points);
        let assumed_speed_kmh = 60.0;
        RouteResponse {
            points,
            distance_km,
            duration_s: (distance_km / assumed_speed_kmh) * 3600.0,
            fallback: true,
        }
    }

    async fn insert(&self, key: CacheKey, response: RouteResponse) {
        let mut entries = self.entries.write().await;
        let mut order = self.order.lock().await;

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            if let Some(oldest) = order.pop_front() {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                response,
                inserted_at: Instant::now(),
            },
        );
        order.retain(|k| k != &key);
        order.push_back(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouteError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl RouteClient for CountingClient {
        async fn route(&self, start: Location, end: Location) -> Result<RouteResponse, RouteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RouteError::Unavailable("forced failure".into()));
            }
            Ok(RouteResponse {
                points: vec![start.point(), end.point()],
                distance_km: start.distance_km(&end),
                duration_s: 100.0,
                fallback: false,
            })
        }
    }

    fn loc(lat: f64, lng: f64) -> Location {
        Location::new(lat, lng, None)
    }

    #[tokio::test]
    async fn cache_hit_avoids_second_client_call() {
        let client = Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = RouteCache::new(client.clone(), 10, Duration::from_secs(60), 1, Duration::from_secs(20), 5.0, 20);

        let a = cache.route(loc(0.0, 0.0), loc(1.0, 1.0)).await;
        let b = cache.route(loc(0.0, 0.0), loc(1.0, 1.0)).await;

        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert!(!a.fallback);
        assert!(!b.fallback);
    }

    #[tokio::test]
    async fn failing_client_yields_fallback_polyline() {
        let client = Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let cache = RouteCache::new(client, 10, Duration::from_secs(60), 0, Duration::from_millis(50), 5.0, 20);

        let resp = cache.route(loc(0.0, 0.0), loc(1.0, 1.0)).await;
        assert!(resp.fallback);
        assert!(resp.points.len() >= 20);
    }

    #[tokio::test]
    async fn eviction_respects_capacity() {
        let client = Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = RouteCache::new(client, 1, Duration::from_secs(60), 0, Duration::from_secs(1), 5.0, 20);

        cache.route(loc(0.0, 0.0), loc(1.0, 1.0)).await;
        cache.route(loc(10.0, 10.0), loc(11.0, 11.0)).await;

        let entries = cache.entries.read().await;
        assert_eq!(entries.len(), 1);
    }
}

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::geo::GeoPoint;
use crate::model::Location;

/// A resolved route: an ordered polyline plus aggregate distance/duration.
/// `fallback = true` when the polyline was synthesized rather than
/// obtained from the external routing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub points: Vec<GeoPoint>,
    pub distance_km: f64,
    pub duration_s: f64,
    pub fallback: bool,
}

/// The external routing service boundary: given two endpoints, returns
/// `[lng, lat]`-ordered coordinates, a distance in meters, and a
/// duration in seconds. Implementations must themselves respect an
/// overall deadline; [`RouteError::Timeout`] signals that the caller's
/// `tokio::time::timeout` wrapper (or the client's own) elapsed.
#[async_trait]
pub trait RouteClient: Send + Sync {
    async fn route(&self, start: Location, end: Location) -> Result<RouteResponse, RouteError>;
}

#[derive(Debug, Serialize)]
struct RouteRequest {
    start: [f64; 2],
    end: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct RouteApiResponse {
    /// `[lng, lat]` pairs, per the external routing contract.
    coordinates: Vec<[f64; 2]>,
    distance_m: f64,
    duration_s: f64,
}

/// `reqwest`-backed [`RouteClient`], the same bounded external JSON call
/// shape used elsewhere in this crate for HTTP dependencies, generalized
/// to the routing-service contract.
pub struct HttpRouteClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpRouteClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl RouteClient for HttpRouteClient {
    async fn route(&self, start: Location, end: Location) -> Result<RouteResponse, RouteError> {
        let body = RouteRequest {
            start: [start.lng, start.lat],
            end: [end.lng, end.lat],
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RouteError::Unavailable(format!(
                "routing service returned status {}",
                response.status()
            )));
        }

        let parsed: RouteApiResponse = response
            .json()
            .await
            .map_err(|e| RouteError::Malformed(e.to_string()))?;

        if parsed.coordinates.is_empty() {
            return Err(RouteError::Malformed("empty coordinate list".into()));
        }

        let points = parsed
            .coordinates
            .iter()
            .map(|[lng, lat]| GeoPoint::new(*lat, *lng))
            .collect();

        Ok(RouteResponse {
            points,
            distance_km: parsed.distance_m / 1000.0,
            duration_s: parsed.duration_s,
            fallback: false,
        })
    }
}

/// Always-unavailable route client, used when no routing-service endpoint
/// is configured. The [`RouteCache`](super::cache::RouteCache) wrapping it
/// always falls back to a synthetic polyline, so this is a legitimate
/// runtime mode (symmetric with [`crate::advisor::NullAdvisorClient`]).
pub struct NullRouteClient;

#[async_trait]
impl RouteClient for NullRouteClient {
    async fn route(&self, _start: Location, _end: Location) -> Result<RouteResponse, RouteError> {
        Err(RouteError::Unavailable("no routing service configured".into()))
    }
}

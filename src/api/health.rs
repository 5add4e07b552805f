use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::engine::Engine;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub healthy: bool,
    pub vehicle_count: usize,
    pub load_count: usize,
    pub trip_count: usize,
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(engine): State<Arc<Engine>>) -> Json<HealthResponse> {
    let snapshot = engine.snapshot().await;
    Json(HealthResponse {
        healthy: true,
        vehicle_count: snapshot.vehicles.len(),
        load_count: snapshot.loads.len(),
        trip_count: snapshot.trips.len(),
    })
}

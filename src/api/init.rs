use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::engine::Engine;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitializeRequest {
    pub num_vehicles: usize,
    pub num_loads: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitializeResponse {
    pub vehicles_created: usize,
    pub loads_created: usize,
}

/// Seeds the fleet and load board.
#[utoipa::path(
    post,
    path = "/api/initialize",
    request_body = InitializeRequest,
    responses(
        (status = 200, description = "Counts of seeded vehicles and loads", body = InitializeResponse)
    ),
    tag = "dispatch"
)]
pub async fn initialize(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<InitializeRequest>,
) -> Json<InitializeResponse> {
    let (vehicles_created, loads_created) = engine.initialize(request.num_vehicles, request.num_loads).await;
    Json(InitializeResponse { vehicles_created, loads_created })
}

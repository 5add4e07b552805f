use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::engine::Engine;
use crate::model::{Vehicle, VehicleStatus};

#[derive(Debug, Deserialize, IntoParams)]
pub struct VehicleQuery {
    pub status: Option<VehicleStatus>,
}

/// Lists vehicles, optionally filtered by status.
#[utoipa::path(
    get,
    path = "/api/vehicles",
    params(VehicleQuery),
    responses(
        (status = 200, description = "Vehicles matching the filter", body = [Vehicle])
    ),
    tag = "dispatch"
)]
pub async fn list_vehicles(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<VehicleQuery>,
) -> Json<Vec<Arc<Vehicle>>> {
    Json(engine.vehicles(query.status).await)
}

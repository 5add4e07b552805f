use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::engine::Engine;
use crate::model::{Load, LoadStatus};

#[derive(Debug, Deserialize, IntoParams)]
pub struct LoadQuery {
    pub status: Option<LoadStatus>,
}

/// Lists loads, optionally filtered by status.
#[utoipa::path(
    get,
    path = "/api/loads",
    params(LoadQuery),
    responses(
        (status = 200, description = "Loads matching the filter", body = [Load])
    ),
    tag = "dispatch"
)]
pub async fn list_loads(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<LoadQuery>,
) -> Json<Vec<Arc<Load>>> {
    Json(engine.loads(query.status).await)
}

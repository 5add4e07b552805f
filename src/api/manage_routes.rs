use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::agents::adapter::TripDecision;
use crate::engine::Engine;

/// Runs the Adapter agent once.
#[utoipa::path(
    post,
    path = "/api/manage-routes",
    responses(
        (status = 200, description = "Per-trip Adapter decisions for this invocation", body = [TripDecision])
    ),
    tag = "dispatch"
)]
pub async fn manage_routes(State(engine): State<Arc<Engine>>) -> Json<Vec<TripDecision>> {
    Json(engine.manage_routes().await)
}

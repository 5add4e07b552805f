use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::engine::Engine;
use crate::model::Snapshot;

/// Returns the full current [`Snapshot`].
#[utoipa::path(
    get,
    path = "/api/state",
    responses(
        (status = 200, description = "Full current snapshot", body = Snapshot)
    ),
    tag = "dispatch"
)]
pub async fn get_state(State(engine): State<Arc<Engine>>) -> Json<Snapshot> {
    Json(engine.snapshot().await)
}

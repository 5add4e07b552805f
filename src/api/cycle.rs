use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::engine::Engine;
use crate::model::Event;

#[derive(Debug, Serialize, ToSchema)]
pub struct CycleResponse {
    pub events: Vec<Arc<Event>>,
}

/// Runs the Observer agent once.
#[utoipa::path(
    post,
    path = "/api/cycle",
    responses(
        (status = 200, description = "Events emitted by this Observer cycle", body = CycleResponse)
    ),
    tag = "dispatch"
)]
pub async fn run_cycle(State(engine): State<Arc<Engine>>) -> Json<CycleResponse> {
    let (events, _triggers) = engine.cycle().await;
    Json(CycleResponse { events })
}

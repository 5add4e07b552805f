use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::engine::Engine;
use crate::model::Event;

fn default_limit() -> usize {
    100
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EventQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub event_type: Option<String>,
}

/// Lists recent events, newest first, optionally filtered by type and
/// bounded by `limit`.
#[utoipa::path(
    get,
    path = "/api/events",
    params(EventQuery),
    responses(
        (status = 200, description = "Recent events, newest first", body = [Event])
    ),
    tag = "dispatch"
)]
pub async fn list_events(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<EventQuery>,
) -> Json<Vec<Arc<Event>>> {
    Json(engine.events(query.limit, query.event_type.as_deref()).await)
}

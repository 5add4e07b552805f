use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::agents::matcher::MatchOutcome;
use crate::engine::Engine;

/// Runs the Matcher agent once.
#[utoipa::path(
    post,
    path = "/api/match-loads",
    responses(
        (status = 200, description = "Matcher outcome for this invocation", body = MatchOutcome)
    ),
    tag = "dispatch"
)]
pub async fn match_loads(State(engine): State<Arc<Engine>>) -> Json<MatchOutcome> {
    Json(engine.match_loads().await)
}

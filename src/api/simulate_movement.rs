use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::engine::Engine;
use crate::predictor::TripPrediction;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SimulateMovementQuery {
    pub dt_seconds: Option<f64>,
}

/// Runs one Motion tick and returns the Predictor's readout over the
/// resulting state. `dt_seconds` defaults to
/// the configured Motion tick period.
#[utoipa::path(
    post,
    path = "/api/simulate-movement",
    params(SimulateMovementQuery),
    responses(
        (status = 200, description = "Predictor output after advancing one Motion tick", body = [TripPrediction])
    ),
    tag = "dispatch"
)]
pub async fn simulate_movement(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<SimulateMovementQuery>,
) -> Json<Vec<TripPrediction>> {
    let dt_seconds = query.dt_seconds.unwrap_or(engine.config.tick.period_motion_s as f64);
    Json(engine.simulate_movement(dt_seconds).await)
}

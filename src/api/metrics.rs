use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::engine::Engine;
use crate::predictor::Kpis;

/// Returns the fleet-wide KPI aggregate.
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses(
        (status = 200, description = "Fleet-wide KPI aggregate", body = Kpis)
    ),
    tag = "dispatch"
)]
pub async fn get_metrics(State(engine): State<Arc<Engine>>) -> Json<Kpis> {
    let snapshot = engine.snapshot().await;
    Json(engine.kpis(&snapshot))
}

pub mod cycle;
pub mod error;
pub mod events;
pub mod health;
pub mod init;
pub mod loads;
pub mod manage_routes;
pub mod match_loads;
pub mod metrics;
pub mod simulate_movement;
pub mod state;
pub mod vehicles;

pub use error::{internal_error, ErrorResponse};

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::engine::Engine;

pub fn router() -> Router<Arc<Engine>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/initialize", post(init::initialize))
        .route("/state", get(state::get_state))
        .route("/metrics", get(metrics::get_metrics))
        .route("/vehicles", get(vehicles::list_vehicles))
        .route("/loads", get(loads::list_loads))
        .route("/events", get(events::list_events))
        .route("/cycle", post(cycle::run_cycle))
        .route("/match-loads", post(match_loads::match_loads))
        .route("/manage-routes", post(manage_routes::manage_routes))
        .route("/simulate-movement", post(simulate_movement::simulate_movement))
}

pub mod advisor;
pub mod agents;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod model;
pub mod motion;
pub mod predictor;
pub mod routing;
pub mod store;

use axum::Router;
use tokio::sync::watch;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use engine::Engine;

#[derive(OpenApi)]
#[openapi(
    info(title = "Adaptive Fleet Dispatch Engine", version = "0.1.0"),
    paths(
        api::health::health_check,
        api::init::initialize,
        api::state::get_state,
        api::metrics::get_metrics,
        api::vehicles::list_vehicles,
        api::loads::list_loads,
        api::events::list_events,
        api::cycle::run_cycle,
        api::match_loads::match_loads,
        api::manage_routes::manage_routes,
        api::simulate_movement::simulate_movement,
    ),
    components(schemas(
        api::health::HealthResponse,
        api::init::InitializeRequest,
        api::init::InitializeResponse,
        api::cycle::CycleResponse,
        api::error::ErrorResponse,
        model::Vehicle,
        model::VehicleStatus,
        model::Load,
        model::LoadStatus,
        model::Trip,
        model::TripPhase,
        model::Event,
        model::EventKind,
        model::Snapshot,
        model::Location,
        geo::GeoPoint,
        predictor::Kpis,
        predictor::TripPrediction,
        predictor::OnTimeStatus,
        predictor::Advisory,
        agents::matcher::MatchOutcome,
        agents::matcher::ApprovedMatch,
        agents::adapter::TripDecision,
        agents::adapter::Decision,
    )),
    tags(
        (name = "dispatch", description = "Fleet dispatch lifecycle and agent endpoints"),
        (name = "health", description = "Service health check")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    let config = Config::load_or_default("config.yaml");
    tracing::info!(bind_addr = %config.bind_addr, "loaded configuration");

    let cors_layer = if config.cors_permissive {
        tracing::warn!("CORS: permissive mode enabled (all origins allowed) - do not use in production");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    let bind_addr = config.bind_addr.clone();
    let engine = Engine::new(config);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let dispatch_handles = engine::spawn_dispatch_loop(engine.clone(), cancel_rx);

    let app: Router = Router::new()
        .nest("/api", api::router())
        .with_state(engine)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {bind_addr}: {e}"));

    tracing::info!(bind_addr, "dispatch engine listening");
    tracing::info!("swagger UI: http://{bind_addr}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("server failed");

    let _ = cancel_tx.send(true);
    for handle in dispatch_handles {
        let _ = handle.await;
    }
}

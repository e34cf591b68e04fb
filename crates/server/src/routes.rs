//! Route table.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/plugins", get(handlers::list_plugins))
        .route("/v1/plugins/{plugin_id}", get(handlers::get_plugin))
        .route(
            "/v1/plugins/{plugin_id}/compute",
            post(handlers::submit_computation),
        )
        .route("/v1/plugins/{plugin_id}/demo", get(handlers::run_demo))
        .route("/v1/computations", get(handlers::list_computations))
        .route(
            "/v1/computations/watch",
            get(handlers::watch_computations),
        )
        .route(
            "/v1/computations/{correlation_id}/state",
            get(handlers::get_computation_state),
        )
        .route(
            "/v1/computations/{correlation_id}",
            delete(handlers::cancel_computation),
        )
        .route(
            "/v1/artifacts/{correlation_id}",
            get(handlers::list_artifacts),
        )
        .route(
            "/v1/artifacts/{correlation_id}/{artifact_id}",
            get(handlers::download_artifact),
        )
        .route("/v1/objects/{*key}", get(handlers::serve_object))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Health endpoint.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};
use tracing::warn;

/// GET /v1/health
///
/// Checks the registry, object store, and worker backend. Any failing
/// component turns the whole response into 503.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let mut healthy = true;

    let registry = match state.registry.health_check().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            warn!(error = %e, "registry health check failed");
            healthy = false;
            e.to_string()
        }
    };

    let storage = match state.storage.health_check().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            warn!(error = %e, "storage health check failed");
            healthy = false;
            e.to_string()
        }
    };

    let backend = match state.backend.health_check().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            warn!(error = %e, "backend health check failed");
            healthy = false;
            e.to_string()
        }
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "registry": registry,
            "storage": storage,
            "backend": { "name": state.backend.backend_name(), "status": backend },
        })),
    )
}

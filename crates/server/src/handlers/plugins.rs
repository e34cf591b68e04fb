//! Plugin catalog and submission handlers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use relay_core::{CacheClass, ComputationState, PluginInfo, input_fingerprint};
use relay_registry::models::ComputationRow;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

/// Response for plugin listings.
#[derive(Debug, Serialize)]
pub struct PluginListResponse {
    pub plugins: Vec<PluginInfo>,
}

/// Response for an accepted or coalesced submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub correlation_id: Uuid,
    pub state: ComputationState,
    /// True when the request was answered by an existing computation
    /// (in-flight or cached) instead of starting a new one.
    pub reused: bool,
}

/// GET /v1/plugins
pub async fn list_plugins(State(state): State<AppState>) -> ApiResult<Json<PluginListResponse>> {
    let plugins = state.catalog.list_plugins().await?;
    Ok(Json(PluginListResponse { plugins }))
}

/// GET /v1/plugins/{plugin_id}
pub async fn get_plugin(
    State(state): State<AppState>,
    Path(plugin_id): Path<String>,
) -> ApiResult<Json<PluginInfo>> {
    let plugin = state
        .catalog
        .get_plugin(&plugin_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("plugin {plugin_id}")))?;
    Ok(Json(plugin))
}

/// POST /v1/plugins/{plugin_id}/compute
///
/// Accepts the computation and returns its correlation id. Identical
/// submissions coalesce: a second request with the same plugin and
/// canonically-equal parameters gets the in-flight or cached
/// computation's correlation id instead of a new one.
pub async fn submit_computation(
    State(state): State<AppState>,
    Path(plugin_id): Path<String>,
    Json(params): Json<Value>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let plugin = state
        .catalog
        .get_plugin(&plugin_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("plugin {plugin_id}")))?;

    if !params.is_object() {
        return Err(ApiError::BadRequest(
            "computation parameters must be a JSON object".to_string(),
        ));
    }

    admit(&state, &plugin, params, false).await
}

/// GET /v1/plugins/{plugin_id}/demo
///
/// Runs the plugin's canonical demo parameters. Demo results are cached
/// indefinitely, so repeated calls converge on one computation.
pub async fn run_demo(
    State(state): State<AppState>,
    Path(plugin_id): Path<String>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let plugin = state
        .catalog
        .get_plugin(&plugin_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("plugin {plugin_id}")))?;

    let demo_params = plugin
        .demo_params
        .clone()
        .ok_or_else(|| ApiError::NotFound(format!("plugin {plugin_id} has no demo")))?;

    admit(&state, &plugin, demo_params, true).await
}

/// Admit a submission under the per-fingerprint lock.
async fn admit(
    state: &AppState,
    plugin: &PluginInfo,
    params: Value,
    demo: bool,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let fingerprint = input_fingerprint(&plugin.plugin_id, &plugin.version, &params);
    let _guard = state.admission.acquire(&plugin.plugin_id, &fingerprint).await;

    // With caching disabled system-wide, dedup is skipped entirely and
    // every submission admits a fresh record. Demo runs always dedup.
    if demo || state.config.cache.enabled {
        // Coalesce onto in-flight work first.
        if let Some(active) = state.registry.find_active_by_fingerprint(&fingerprint).await? {
            let current = active
                .computation_state()
                .unwrap_or(ComputationState::Queued);
            return Ok((
                StatusCode::OK,
                Json(SubmitResponse {
                    correlation_id: active.correlation_id,
                    state: current,
                    reused: true,
                }),
            ));
        }

        // Then the result cache.
        if let Some(cached) = state
            .registry
            .find_latest_succeeded_by_fingerprint(&fingerprint)
            .await?
        {
            if cache_entry_valid(state, &cached) {
                return Ok((
                    StatusCode::OK,
                    Json(SubmitResponse {
                        correlation_id: cached.correlation_id,
                        state: ComputationState::Succeeded,
                        reused: true,
                    }),
                ));
            }
        }
    }

    let cache_class = if demo {
        CacheClass::Demo
    } else if state.config.cache.enabled {
        CacheClass::Normal
    } else {
        CacheClass::Disabled
    };

    let now = OffsetDateTime::now_utc();
    let row = ComputationRow {
        correlation_id: Uuid::new_v4(),
        plugin_id: plugin.plugin_id.clone(),
        plugin_version: plugin.version.clone(),
        params_json: params.to_string(),
        fingerprint,
        state: ComputationState::Queued.as_str().to_string(),
        cache_class: cache_class.as_str().to_string(),
        error_message: None,
        backend_task_id: None,
        created_at: now,
        updated_at: now,
        finished_at: None,
    };
    state.registry.create_computation(&row).await?;
    state.lifecycle.announce_created(row.correlation_id).await;

    info!(
        correlation_id = %row.correlation_id,
        plugin = %plugin.plugin_id,
        demo,
        "computation accepted"
    );
    state.sender.submit(&row).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            correlation_id: row.correlation_id,
            state: ComputationState::Queued,
            reused: false,
        }),
    ))
}

/// Whether a succeeded computation may answer a new submission.
fn cache_entry_valid(state: &AppState, row: &ComputationRow) -> bool {
    match row.cache_class_parsed() {
        // Demo previews never expire.
        Some(CacheClass::Demo) => true,
        Some(CacheClass::Normal) => {
            if !state.config.cache.enabled {
                return false;
            }
            let cutoff = OffsetDateTime::now_utc() - state.config.cache.retention();
            row.finished_at.is_some_and(|finished| finished >= cutoff)
        }
        Some(CacheClass::Disabled) | None => false,
    }
}

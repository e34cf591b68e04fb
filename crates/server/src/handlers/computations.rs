//! Computation state, cancellation, and live watch handlers.

use crate::error::{ApiError, ApiResult};
use crate::hub::{NotificationHub, SubscriptionMessage};
use crate::state::AppState;
use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use relay_core::ComputationState;
use relay_registry::models::ComputationRow;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

/// Computation state as returned to clients.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub correlation_id: Uuid,
    pub plugin_id: String,
    pub state: ComputationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
}

impl StateResponse {
    fn from_row(row: ComputationRow) -> ApiResult<Self> {
        let state = row.computation_state().ok_or_else(|| {
            ApiError::Internal(format!(
                "computation {} has corrupt state",
                row.correlation_id
            ))
        })?;
        Ok(Self {
            correlation_id: row.correlation_id,
            plugin_id: row.plugin_id,
            state,
            error_message: row.error_message,
            created_at: row.created_at,
            finished_at: row.finished_at,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum number of computations to return.
    #[serde(default = "default_list_limit")]
    pub limit: u32,
}

fn default_list_limit() -> u32 {
    50
}

#[derive(Debug, Serialize)]
pub struct ComputationListResponse {
    pub computations: Vec<StateResponse>,
}

/// GET /v1/computations
///
/// Most recently updated first, for operator inspection.
pub async fn list_computations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ComputationListResponse>> {
    let computations = state
        .registry
        .list_recent(query.limit.min(500))
        .await?
        .into_iter()
        .map(StateResponse::from_row)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(ComputationListResponse { computations }))
}

/// GET /v1/computations/{correlation_id}/state
pub async fn get_computation_state(
    State(state): State<AppState>,
    Path(correlation_id): Path<Uuid>,
) -> ApiResult<Json<StateResponse>> {
    let row = state
        .registry
        .get_computation(correlation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("computation {correlation_id}")))?;
    Ok(Json(StateResponse::from_row(row)?))
}

/// DELETE /v1/computations/{correlation_id}
///
/// Requests cancellation. Finished computations cannot be cancelled;
/// the registry transition decides the race against a completing worker.
pub async fn cancel_computation(
    State(state): State<AppState>,
    Path(correlation_id): Path<Uuid>,
) -> ApiResult<Json<StateResponse>> {
    let row = state
        .registry
        .get_computation(correlation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("computation {correlation_id}")))?;

    if row
        .computation_state()
        .is_some_and(|current| current.is_terminal())
    {
        return Err(ApiError::Conflict(format!(
            "computation {correlation_id} already finished as {}",
            row.state
        )));
    }

    let updated = state.sender.cancel(&row).await?;
    Ok(Json(StateResponse::from_row(updated)?))
}

#[derive(Debug, Deserialize)]
pub struct WatchQuery {
    /// Restrict the stream to one computation. Without it, all state
    /// events are delivered.
    pub correlation_id: Option<Uuid>,
}

/// GET /v1/computations/watch
///
/// WebSocket stream of committed state events, interleaved with
/// heartbeat frames on idle connections. No backfill: read the current
/// state first, then watch.
pub async fn watch_computations(
    State(state): State<AppState>,
    Query(query): Query<WatchQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| watch_socket(socket, hub, query.correlation_id))
}

async fn watch_socket(mut socket: WebSocket, hub: Arc<NotificationHub>, filter: Option<Uuid>) {
    let mut subscription = hub.subscribe(filter);
    debug!(?filter, "watch subscriber connected");

    loop {
        tokio::select! {
            message = subscription.next() => {
                let Some(message) = message else { break };
                let payload = match message {
                    SubscriptionMessage::Event(event) => {
                        let mut value = match serde_json::to_value(&event) {
                            Ok(value) => value,
                            Err(_) => break,
                        };
                        value["type"] = json!("state");
                        value
                    }
                    SubscriptionMessage::Heartbeat => json!({ "type": "heartbeat" }),
                };
                if socket
                    .send(Message::Text(payload.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Pings are answered by axum; other client frames are ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!(?filter, "watch subscriber disconnected");
}

//! Artifact listing and download handlers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use relay_core::ComputationState;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A listed artifact.
#[derive(Debug, Serialize)]
pub struct ArtifactEntry {
    pub artifact_id: Uuid,
    pub media_type: String,
    pub size_bytes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Server-relative path that redirects to a signed download URL.
    pub download_path: String,
}

#[derive(Debug, Serialize)]
pub struct ArtifactListResponse {
    pub correlation_id: Uuid,
    pub artifacts: Vec<ArtifactEntry>,
}

/// GET /v1/artifacts/{correlation_id}
///
/// An empty list is the not-ready signal: unknown, non-terminal, failed,
/// and cancelled computations all list as empty rather than erroring.
/// Artifacts appear exactly when the computation is observed as succeeded.
pub async fn list_artifacts(
    State(state): State<AppState>,
    Path(correlation_id): Path<Uuid>,
) -> ApiResult<Json<ArtifactListResponse>> {
    let succeeded = state
        .registry
        .get_computation(correlation_id)
        .await?
        .and_then(|row| row.computation_state())
        == Some(ComputationState::Succeeded);

    if !succeeded {
        return Ok(Json(ArtifactListResponse {
            correlation_id,
            artifacts: Vec::new(),
        }));
    }

    let artifacts = state
        .registry
        .list_artifacts(correlation_id)
        .await?
        .into_iter()
        .map(|artifact| ArtifactEntry {
            download_path: format!("/v1/artifacts/{}/{}", correlation_id, artifact.artifact_id),
            artifact_id: artifact.artifact_id,
            media_type: artifact.media_type,
            size_bytes: artifact.size_bytes,
            label: artifact.label,
            created_at: artifact.created_at,
        })
        .collect();

    Ok(Json(ArtifactListResponse {
        correlation_id,
        artifacts,
    }))
}

/// GET /v1/artifacts/{correlation_id}/{artifact_id}
///
/// Issues a time-limited signed URL for the stored object and redirects
/// to it, so the artifact bytes are fetched without a session.
pub async fn download_artifact(
    State(state): State<AppState>,
    Path((correlation_id, artifact_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Redirect> {
    let artifact = state
        .registry
        .get_artifact(correlation_id, artifact_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("artifact {artifact_id}")))?;

    let signed = state.signer.sign(&artifact.object_key);
    Ok(Redirect::temporary(&signed.to_path()))
}

#[derive(Debug, Deserialize)]
pub struct ObjectQuery {
    pub expires: i64,
    pub sig: String,
}

/// GET /v1/objects/{*key}
///
/// Serves a stored object after verifying its signed URL.
pub async fn serve_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<ObjectQuery>,
) -> ApiResult<Response> {
    state.signer.verify(&key, query.expires, &query.sig)?;

    let data = state.storage.get(&key).await?;
    let media_type = lookup_media_type(&state, &key).await;

    Ok((
        [(header::CONTENT_TYPE, media_type)],
        data,
    )
        .into_response())
}

/// Best-effort media type for an object key.
///
/// Keys are laid out as `{correlation_id}/{file_name}`, so the owning
/// artifact row carries the type. Unmatched keys fall back to a generic
/// binary type.
async fn lookup_media_type(state: &AppState, key: &str) -> String {
    let correlation_id = key
        .split_once('/')
        .and_then(|(prefix, _)| Uuid::parse_str(prefix).ok());

    if let Some(correlation_id) = correlation_id {
        if let Ok(artifacts) = state.registry.list_artifacts(correlation_id).await {
            if let Some(artifact) = artifacts.into_iter().find(|a| a.object_key == key) {
                return artifact.media_type;
            }
        }
    }
    "application/octet-stream".to_string()
}

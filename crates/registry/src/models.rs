//! Database models mapping to the registry schema.

use relay_core::{CacheClass, ComputationState};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Computation record keyed by correlation id.
#[derive(Debug, Clone, FromRow)]
pub struct ComputationRow {
    pub correlation_id: Uuid,
    pub plugin_id: String,
    pub plugin_version: String,
    /// Canonicalized input parameters as submitted.
    pub params_json: String,
    /// Fingerprint over plugin id, version, and canonical params.
    pub fingerprint: String,
    pub state: String,
    pub cache_class: String,
    pub error_message: Option<String>,
    /// Identifier the worker backend assigned when the task was dispatched.
    pub backend_task_id: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub finished_at: Option<OffsetDateTime>,
}

impl ComputationRow {
    /// Decode the stored state string.
    ///
    /// Stored states are written exclusively through [`ComputationState::as_str`],
    /// so a decode failure indicates a corrupted row.
    pub fn computation_state(&self) -> Option<ComputationState> {
        ComputationState::parse(&self.state)
    }

    pub fn cache_class_parsed(&self) -> Option<CacheClass> {
        CacheClass::parse(&self.cache_class)
    }
}

/// Artifact record produced by a succeeded computation.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactRow {
    pub artifact_id: Uuid,
    pub correlation_id: Uuid,
    /// Key of the stored object in the artifact store.
    pub object_key: String,
    pub media_type: String,
    pub size_bytes: i64,
    /// Optional human-readable label (e.g., "chart", "report").
    pub label: Option<String>,
    pub created_at: OffsetDateTime,
}

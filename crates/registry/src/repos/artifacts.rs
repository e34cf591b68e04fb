//! Artifact repository.

use crate::error::RegistryResult;
use crate::models::ArtifactRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for artifact records.
#[async_trait]
pub trait ArtifactRepo: Send + Sync {
    /// Insert artifact rows for a computation.
    ///
    /// Called by the reconciler before the `succeeded` transition commits,
    /// so that a computation observed as succeeded always has its artifacts
    /// listable.
    async fn add_artifacts(&self, rows: &[ArtifactRow]) -> RegistryResult<()>;

    /// List artifacts for a computation, ordered by creation.
    async fn list_artifacts(&self, correlation_id: Uuid) -> RegistryResult<Vec<ArtifactRow>>;

    /// Get a single artifact scoped to its computation.
    async fn get_artifact(
        &self,
        correlation_id: Uuid,
        artifact_id: Uuid,
    ) -> RegistryResult<Option<ArtifactRow>>;
}

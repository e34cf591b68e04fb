//! Computation repository.

use crate::error::RegistryResult;
use crate::models::ComputationRow;
use async_trait::async_trait;
use relay_core::ComputationState;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for computation lifecycle records.
#[async_trait]
pub trait ComputationRepo: Send + Sync {
    /// Create a computation record in `queued` state.
    async fn create_computation(&self, row: &ComputationRow) -> RegistryResult<()>;

    /// Get a computation by correlation id.
    async fn get_computation(&self, correlation_id: Uuid) -> RegistryResult<Option<ComputationRow>>;

    /// Transition a computation to a new state.
    ///
    /// Validates the transition against the state machine inside a single
    /// transaction; concurrent writers observe a serialized order. Terminal
    /// transitions set `finished_at`. Returns the updated row.
    async fn update_state(
        &self,
        correlation_id: Uuid,
        new_state: ComputationState,
        error_message: Option<&str>,
    ) -> RegistryResult<ComputationRow>;

    /// Record the backend task id assigned at dispatch time.
    async fn set_backend_task(&self, correlation_id: Uuid, task_id: &str) -> RegistryResult<()>;

    /// Find a non-terminal computation with the given fingerprint, if any.
    /// Used to coalesce duplicate submissions onto in-flight work.
    async fn find_active_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> RegistryResult<Option<ComputationRow>>;

    /// Find the most recently finished `succeeded` computation with the
    /// given fingerprint. Used for result cache lookups; the caller applies
    /// cache-class and retention policy.
    async fn find_latest_succeeded_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> RegistryResult<Option<ComputationRow>>;

    /// List all non-terminal computations. Used at startup to resume
    /// reconciliation for work orphaned by a restart.
    async fn list_non_terminal(&self) -> RegistryResult<Vec<ComputationRow>>;

    /// List computations most recently updated first, for operator inspection.
    async fn list_recent(&self, limit: u32) -> RegistryResult<Vec<ComputationRow>>;

    /// Delete succeeded normal-class computations that finished before the
    /// cutoff, together with their artifact rows. Returns the number of
    /// computation rows removed.
    async fn purge_expired(&self, cutoff: OffsetDateTime) -> RegistryResult<u64>;
}

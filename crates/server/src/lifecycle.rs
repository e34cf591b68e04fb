//! Lifecycle transitions with ordered event publication.

use crate::hub::NotificationHub;
use relay_core::{ComputationState, StateEvent};
use relay_registry::models::ComputationRow;
use relay_registry::{RegistryResult, RegistryStore};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Commits state transitions and publishes the matching events.
///
/// A single commit lock serializes persist-then-publish, so subscribers
/// observe events in the same order the registry recorded them. The lock
/// is never held across backend calls or subscriber I/O; publication is
/// a non-blocking channel send.
pub struct Lifecycle {
    registry: Arc<dyn RegistryStore>,
    hub: Arc<NotificationHub>,
    commit_lock: Mutex<()>,
}

impl Lifecycle {
    pub fn new(registry: Arc<dyn RegistryStore>, hub: Arc<NotificationHub>) -> Self {
        Self {
            registry,
            hub,
            commit_lock: Mutex::new(()),
        }
    }

    /// Transition a computation and publish the committed event.
    ///
    /// Fails with `InvalidStateTransition` if the computation already
    /// moved on; callers racing a reconciler treat that as a stop signal.
    pub async fn transition(
        &self,
        correlation_id: Uuid,
        state: ComputationState,
        error_message: Option<String>,
    ) -> RegistryResult<ComputationRow> {
        let _guard = self.commit_lock.lock().await;

        let row = self
            .registry
            .update_state(correlation_id, state, error_message.as_deref())
            .await?;

        info!(%correlation_id, state = %state, "computation transitioned");
        self.hub
            .publish(&StateEvent::new(correlation_id, state, error_message));
        Ok(row)
    }

    /// Announce a freshly created computation.
    ///
    /// Creation is not a transition, but subscribers watching the full
    /// stream still get a `queued` event for it.
    pub async fn announce_created(&self, correlation_id: Uuid) {
        let _guard = self.commit_lock.lock().await;
        self.hub.publish(&StateEvent::new(
            correlation_id,
            ComputationState::Queued,
            None,
        ));
    }

    pub fn registry(&self) -> &Arc<dyn RegistryStore> {
        &self.registry
    }
}

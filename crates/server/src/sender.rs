//! Backend dispatch and per-computation reconciliation.
//!
//! Every accepted computation gets a reconcile loop that polls the worker
//! backend and drives the registry state machine from the backend's task
//! status. The loop is the only writer of `running` and terminal states
//! for a computation, apart from client-initiated cancellation; a lost
//! race with cancellation surfaces as an invalid transition and stops the
//! loop.

use crate::lifecycle::Lifecycle;
use relay_broker::{BrokerError, TaskSpec, TaskStatus, WorkerBackend};
use relay_core::ComputationState;
use relay_core::config::BackendConfig;
use relay_registry::models::{ArtifactRow, ComputationRow};
use relay_registry::{RegistryError, RegistryStore};
use relay_storage::ObjectStore;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Dispatches computations to the worker backend and reconciles their
/// registry state against backend task status.
pub struct BackendSender {
    registry: Arc<dyn RegistryStore>,
    storage: Arc<dyn ObjectStore>,
    backend: Arc<dyn WorkerBackend>,
    lifecycle: Arc<Lifecycle>,
    config: BackendConfig,
    tasks: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl BackendSender {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        storage: Arc<dyn ObjectStore>,
        backend: Arc<dyn WorkerBackend>,
        lifecycle: Arc<Lifecycle>,
        config: BackendConfig,
    ) -> Self {
        Self {
            registry,
            storage,
            backend,
            lifecycle,
            config,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Dispatch a freshly created computation and start its reconcile loop.
    ///
    /// Transient backend unavailability is retried with backoff inside the
    /// grace window; if dispatch never lands, the computation is failed.
    pub async fn submit(self: &Arc<Self>, row: &ComputationRow) {
        let correlation_id = row.correlation_id;
        let spec = TaskSpec {
            correlation_id,
            plugin_id: row.plugin_id.clone(),
            params: serde_json::from_str(&row.params_json).unwrap_or(serde_json::Value::Null),
        };

        let sender = Arc::clone(self);
        let handle = tokio::spawn(async move {
            match sender.dispatch_with_retry(spec).await {
                Ok(task_id) => {
                    if let Err(e) = sender
                        .registry
                        .set_backend_task(correlation_id, &task_id)
                        .await
                    {
                        error!(%correlation_id, error = %e, "failed to record backend task id");
                    }
                    sender.reconcile(correlation_id, task_id).await;
                }
                Err(e) => {
                    warn!(%correlation_id, error = %e, "dispatch failed, failing computation");
                    sender
                        .finish(
                            correlation_id,
                            ComputationState::Failed,
                            Some(format!("could not hand the computation to a worker: {e}")),
                        )
                        .await;
                }
            }
        });

        self.tasks.lock().await.insert(correlation_id, handle);
    }

    /// Resume reconciliation for computations orphaned by a restart.
    ///
    /// Dispatched rows get their reconcile loop back; rows that never
    /// reached the backend are dispatched again from their stored input.
    pub async fn recover(self: &Arc<Self>) -> Result<usize, RegistryError> {
        let orphans = self.registry.list_non_terminal().await?;
        let count = orphans.len();
        if count > 0 {
            warn!(count, "recovering non-terminal computations from previous instance");
        }

        for row in orphans {
            let correlation_id = row.correlation_id;
            match row.backend_task_id.clone() {
                Some(task_id) => {
                    let sender = Arc::clone(self);
                    let handle =
                        tokio::spawn(async move { sender.reconcile(correlation_id, task_id).await });
                    self.tasks.lock().await.insert(correlation_id, handle);
                }
                None => {
                    info!(%correlation_id, "re-dispatching computation that never reached the backend");
                    self.submit(&row).await;
                }
            }
        }
        Ok(count)
    }

    /// Request cancellation of a computation.
    ///
    /// Best-effort towards the backend; the registry transition is the
    /// authoritative outcome and fails if the computation already
    /// finished.
    pub async fn cancel(&self, row: &ComputationRow) -> Result<ComputationRow, RegistryError> {
        if let Some(task_id) = &row.backend_task_id {
            match self.backend.cancel(task_id).await {
                Ok(()) | Err(BrokerError::UnknownTask(_)) => {}
                Err(e) => {
                    warn!(correlation_id = %row.correlation_id, error = %e, "backend cancel failed");
                }
            }
        }

        self.lifecycle
            .transition(row.correlation_id, ComputationState::Cancelled, None)
            .await
    }

    /// Number of reconcile handles still registered. Test hook.
    pub async fn active_tasks(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Drop finished reconcile handles and surface panicked ones.
    ///
    /// A panicked loop would otherwise leave its computation non-terminal
    /// with nobody watching; the sweep fails the computation instead.
    /// Returns the number of handles removed.
    pub async fn sweep_finished(&self) -> usize {
        let finished: Vec<(Uuid, JoinHandle<()>)> = {
            let mut tasks = self.tasks.lock().await;
            let ids: Vec<Uuid> = tasks
                .iter()
                .filter(|(_, handle)| handle.is_finished())
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| tasks.remove(&id).map(|handle| (id, handle)))
                .collect()
        };

        let count = finished.len();
        for (correlation_id, handle) in finished {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(%correlation_id, "reconcile task panicked");
                    self.finish(
                        correlation_id,
                        ComputationState::Failed,
                        Some("internal error while tracking this computation".to_string()),
                    )
                    .await;
                }
            }
        }
        count
    }

    async fn dispatch_with_retry(&self, spec: TaskSpec) -> Result<String, BrokerError> {
        let deadline = Instant::now() + self.config.grace_window();
        loop {
            match self.backend.dispatch(spec.clone()).await {
                Ok(task_id) => return Ok(task_id),
                Err(BrokerError::Unavailable(msg)) if Instant::now() < deadline => {
                    warn!(correlation_id = %spec.correlation_id, %msg, "backend unavailable, retrying dispatch");
                    tokio::time::sleep(self.config.retry_backoff()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Poll the backend until the computation reaches a terminal state.
    async fn reconcile(&self, correlation_id: Uuid, task_id: String) {
        // Start of the current period in which the backend has no usable
        // answer for this task. Cleared whenever a real status arrives.
        let mut unknown_since: Option<Instant> = None;

        loop {
            let status = self.backend.status(&task_id).await;
            match status {
                Ok(TaskStatus::Pending) => {
                    unknown_since = None;
                }
                Ok(TaskStatus::Running) => {
                    unknown_since = None;
                    if !self.ensure_running(correlation_id).await {
                        return;
                    }
                }
                Ok(TaskStatus::Succeeded { artifacts }) => {
                    if let Err(e) = self.persist_artifacts(correlation_id, &artifacts).await {
                        error!(%correlation_id, error = %e, "failed to persist artifacts");
                        self.finish(
                            correlation_id,
                            ComputationState::Failed,
                            Some("the result could not be stored".to_string()),
                        )
                        .await;
                        return;
                    }
                    self.finish(correlation_id, ComputationState::Succeeded, None)
                        .await;
                    return;
                }
                Ok(TaskStatus::Failed { reason }) => {
                    self.finish(correlation_id, ComputationState::Failed, Some(reason))
                        .await;
                    return;
                }
                Ok(TaskStatus::Cancelled) => {
                    // Usually the client-initiated cancel already committed
                    // this; the transition then fails quietly below.
                    self.try_transition(correlation_id, ComputationState::Cancelled, None)
                        .await;
                    return;
                }
                Ok(TaskStatus::Unknown) | Err(BrokerError::Unavailable(_)) => {
                    let since = *unknown_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= self.config.grace_window() {
                        warn!(%correlation_id, %task_id, "backend lost track of task beyond grace window");
                        self.finish(
                            correlation_id,
                            ComputationState::Failed,
                            Some(
                                "the worker backend lost track of this computation".to_string(),
                            ),
                        )
                        .await;
                        return;
                    }
                    tokio::time::sleep(self.config.retry_backoff()).await;
                    continue;
                }
                Err(e) => {
                    error!(%correlation_id, %task_id, error = %e, "backend status query failed");
                    self.finish(
                        correlation_id,
                        ComputationState::Failed,
                        Some(format!("worker backend error: {e}")),
                    )
                    .await;
                    return;
                }
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Write artifact payloads to the object store and record their rows.
    ///
    /// Runs before the `succeeded` transition so a computation observed as
    /// succeeded always lists its artifacts. Idempotent across restarts: a
    /// computation that already has artifact rows is left untouched.
    async fn persist_artifacts(
        &self,
        correlation_id: Uuid,
        artifacts: &[relay_broker::ArtifactPayload],
    ) -> Result<(), crate::error::ApiError> {
        if !self.registry.list_artifacts(correlation_id).await?.is_empty() {
            return Ok(());
        }

        let now = OffsetDateTime::now_utc();
        let mut rows = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let object_key = format!("{}/{}", correlation_id, artifact.file_name);
            self.storage.put(&object_key, artifact.data.clone()).await?;
            rows.push(ArtifactRow {
                artifact_id: Uuid::new_v4(),
                correlation_id,
                object_key,
                media_type: artifact.media_type.clone(),
                size_bytes: artifact.data.len() as i64,
                label: artifact.label.clone(),
                created_at: now,
            });
        }
        self.registry.add_artifacts(&rows).await?;
        Ok(())
    }

    /// Commit `running` if the computation is still queued.
    ///
    /// Returns false when the computation reached a terminal state in the
    /// meantime, which ends the reconcile loop.
    async fn ensure_running(&self, correlation_id: Uuid) -> bool {
        match self
            .lifecycle
            .transition(correlation_id, ComputationState::Running, None)
            .await
        {
            Ok(_) => true,
            Err(RegistryError::InvalidStateTransition { from, .. }) => from == "running",
            Err(e) => {
                error!(%correlation_id, error = %e, "failed to commit running state");
                false
            }
        }
    }

    /// Drive the computation to a terminal state, bridging through
    /// `running` when the backend jumped straight from queued.
    async fn finish(
        &self,
        correlation_id: Uuid,
        state: ComputationState,
        error_message: Option<String>,
    ) {
        if state != ComputationState::Cancelled && !self.ensure_running(correlation_id).await {
            return;
        }
        self.try_transition(correlation_id, state, error_message)
            .await;
    }

    async fn try_transition(
        &self,
        correlation_id: Uuid,
        state: ComputationState,
        error_message: Option<String>,
    ) {
        match self
            .lifecycle
            .transition(correlation_id, state, error_message)
            .await
        {
            Ok(_) => {}
            Err(RegistryError::InvalidStateTransition { from, to }) => {
                // Another writer (usually cancellation) won the race.
                info!(%correlation_id, %from, %to, "transition superseded");
            }
            Err(e) => {
                error!(%correlation_id, error = %e, "failed to commit terminal state");
            }
        }
    }
}

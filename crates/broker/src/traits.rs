//! Worker backend trait definitions.

use crate::error::BrokerResult;
use async_trait::async_trait;
use bytes::Bytes;
use relay_core::PluginInfo;
use serde_json::Value;
use uuid::Uuid;

/// A computation handed to the worker backend.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Correlation id assigned by the gateway; flows through logs and events.
    pub correlation_id: Uuid,
    pub plugin_id: String,
    pub params: Value,
}

/// An artifact payload produced by a finished task.
///
/// The backend returns raw payloads; the gateway owns persistence and
/// writes them to the object store before exposing the result.
#[derive(Debug, Clone)]
pub struct ArtifactPayload {
    /// File name relative to the computation (e.g., "result.json").
    pub file_name: String,
    pub media_type: String,
    pub data: Bytes,
    /// Optional human-readable label (e.g., "chart").
    pub label: Option<String>,
}

/// Status of a dispatched task as reported by the backend.
#[derive(Debug, Clone)]
pub enum TaskStatus {
    /// Accepted but not yet picked up by a worker.
    Pending,
    Running,
    Succeeded { artifacts: Vec<ArtifactPayload> },
    Failed { reason: String },
    Cancelled,
    /// The backend has no record of this task id. Distinct from a
    /// transport failure; the reconciler applies the grace window before
    /// declaring the computation failed.
    Unknown,
}

/// Dispatch and status interface to the worker pool.
#[async_trait]
pub trait WorkerBackend: Send + Sync + 'static {
    /// Submit a task for execution. Returns the backend's task id.
    async fn dispatch(&self, spec: TaskSpec) -> BrokerResult<String>;

    /// Report the current status of a dispatched task.
    async fn status(&self, task_id: &str) -> BrokerResult<TaskStatus>;

    /// Request cancellation of a dispatched task. Best-effort: a task
    /// that already finished keeps its terminal status.
    async fn cancel(&self, task_id: &str) -> BrokerResult<()>;

    /// Static identifier for the backend type, for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify backend connectivity. The default implementation returns Ok(()).
    async fn health_check(&self) -> BrokerResult<()> {
        Ok(())
    }
}

/// Plugin discovery interface.
///
/// The catalog is served by the same backend that executes tasks, so the
/// advertised plugin set always matches what the workers can run.
#[async_trait]
pub trait PluginCatalog: Send + Sync + 'static {
    /// List all available plugins.
    async fn list_plugins(&self) -> BrokerResult<Vec<PluginInfo>>;

    /// Get a single plugin by id.
    async fn get_plugin(&self, plugin_id: &str) -> BrokerResult<Option<PluginInfo>>;
}

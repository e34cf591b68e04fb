//! In-process worker backend.
//!
//! Runs plugins on the local tokio runtime with a semaphore bounding
//! concurrency. Suitable for single-node deployments and tests; the
//! gateway only ever talks to it through [`WorkerBackend`], so swapping
//! in a remote queue does not touch the lifecycle code.

use crate::error::{BrokerError, BrokerResult};
use crate::traits::{ArtifactPayload, PluginCatalog, TaskSpec, TaskStatus, WorkerBackend};
use async_trait::async_trait;
use relay_core::PluginInfo;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// A plugin implementation runnable by the local backend.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Catalog entry for this plugin.
    fn info(&self) -> PluginInfo;

    /// Execute the computation. A returned `Err` becomes the failure
    /// reason on the computation record.
    async fn run(&self, params: Value) -> Result<Vec<ArtifactPayload>, String>;
}

struct TaskEntry {
    status: TaskStatus,
    handle: Option<JoinHandle<()>>,
}

/// Worker backend executing plugins in-process.
pub struct LocalBackend {
    plugins: HashMap<String, Arc<dyn Worker>>,
    semaphore: Arc<Semaphore>,
    tasks: Arc<Mutex<HashMap<String, TaskEntry>>>,
}

impl LocalBackend {
    /// Create a backend with the given concurrency bound.
    pub fn new(max_concurrent_tasks: usize) -> Self {
        Self {
            plugins: HashMap::new(),
            semaphore: Arc::new(Semaphore::new(max_concurrent_tasks.max(1))),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a plugin. Later registrations with the same id replace
    /// earlier ones.
    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        let info = worker.info();
        self.plugins.insert(info.plugin_id.clone(), worker);
    }

    /// Create a backend with the stock plugin set registered.
    pub fn with_default_plugins(max_concurrent_tasks: usize) -> Self {
        let mut backend = Self::new(max_concurrent_tasks);
        backend.register(Arc::new(EchoWorker));
        backend
    }
}

#[async_trait]
impl WorkerBackend for LocalBackend {
    async fn dispatch(&self, spec: TaskSpec) -> BrokerResult<String> {
        let worker = self
            .plugins
            .get(&spec.plugin_id)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownPlugin(spec.plugin_id.clone()))?;

        let task_id = Uuid::new_v4().to_string();
        let tasks = Arc::clone(&self.tasks);
        let semaphore = Arc::clone(&self.semaphore);
        let correlation_id = spec.correlation_id;
        let plugin_id = spec.plugin_id.clone();
        let params = spec.params;

        let worker_task_id = task_id.clone();
        let handle = tokio::spawn(async move {
            // Closed only on shutdown; a closed semaphore leaves the task
            // pending and the grace window fails it.
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            set_status(&tasks, &worker_task_id, TaskStatus::Running).await;
            info!(%correlation_id, plugin = %plugin_id, task_id = %worker_task_id, "task started");

            let status = match worker.run(params).await {
                Ok(artifacts) => TaskStatus::Succeeded { artifacts },
                Err(reason) => {
                    warn!(%correlation_id, plugin = %plugin_id, %reason, "task failed");
                    TaskStatus::Failed { reason }
                }
            };
            set_status(&tasks, &worker_task_id, status).await;
        });

        self.tasks.lock().await.insert(
            task_id.clone(),
            TaskEntry {
                status: TaskStatus::Pending,
                handle: Some(handle),
            },
        );

        Ok(task_id)
    }

    async fn status(&self, task_id: &str) -> BrokerResult<TaskStatus> {
        let tasks = self.tasks.lock().await;
        Ok(tasks
            .get(task_id)
            .map(|entry| entry.status.clone())
            .unwrap_or(TaskStatus::Unknown))
    }

    async fn cancel(&self, task_id: &str) -> BrokerResult<()> {
        let mut tasks = self.tasks.lock().await;
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| BrokerError::UnknownTask(task_id.to_string()))?;

        match entry.status {
            TaskStatus::Pending | TaskStatus::Running => {
                if let Some(handle) = entry.handle.take() {
                    handle.abort();
                }
                entry.status = TaskStatus::Cancelled;
            }
            // Already terminal; cancellation is a no-op.
            _ => {}
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

#[async_trait]
impl PluginCatalog for LocalBackend {
    async fn list_plugins(&self) -> BrokerResult<Vec<PluginInfo>> {
        let mut plugins: Vec<PluginInfo> = self.plugins.values().map(|w| w.info()).collect();
        plugins.sort_by(|a, b| a.plugin_id.cmp(&b.plugin_id));
        Ok(plugins)
    }

    async fn get_plugin(&self, plugin_id: &str) -> BrokerResult<Option<PluginInfo>> {
        Ok(self.plugins.get(plugin_id).map(|w| w.info()))
    }
}

async fn set_status(tasks: &Mutex<HashMap<String, TaskEntry>>, task_id: &str, status: TaskStatus) {
    let mut tasks = tasks.lock().await;
    if let Some(entry) = tasks.get_mut(task_id) {
        // Cancellation may have landed while the worker ran; terminal
        // statuses are never overwritten.
        if matches!(entry.status, TaskStatus::Pending | TaskStatus::Running) {
            entry.status = status;
        }
    }
}

/// Sample plugin that echoes its parameters back as a JSON artifact.
pub struct EchoWorker;

#[async_trait]
impl Worker for EchoWorker {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            plugin_id: "echo".to_string(),
            version: "1.0.0".to_string(),
            description: "Echoes submitted parameters back as a JSON artifact".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string" },
                    "delay_ms": { "type": "integer", "minimum": 0 }
                },
                "required": ["message"]
            }),
            demo_params: Some(serde_json::json!({ "message": "hello" })),
        }
    }

    async fn run(&self, params: Value) -> Result<Vec<ArtifactPayload>, String> {
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required parameter 'message'".to_string())?;

        if let Some(delay_ms) = params.get("delay_ms").and_then(Value::as_u64) {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }

        let body = serde_json::json!({ "echo": message, "params": params });
        Ok(vec![ArtifactPayload {
            file_name: "result.json".to_string(),
            media_type: "application/json".to_string(),
            data: bytes::Bytes::from(body.to_string()),
            label: Some("result".to_string()),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spec(params: Value) -> TaskSpec {
        TaskSpec {
            correlation_id: Uuid::new_v4(),
            plugin_id: "echo".to_string(),
            params,
        }
    }

    async fn wait_terminal(backend: &LocalBackend, task_id: &str) -> TaskStatus {
        for _ in 0..100 {
            let status = backend.status(task_id).await.unwrap();
            match status {
                TaskStatus::Pending | TaskStatus::Running => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                terminal => return terminal,
            }
        }
        panic!("task did not reach a terminal status");
    }

    #[tokio::test]
    async fn echo_task_succeeds_with_artifact() {
        let backend = LocalBackend::with_default_plugins(2);
        let task_id = backend
            .dispatch(spec(serde_json::json!({ "message": "hi" })))
            .await
            .unwrap();

        match wait_terminal(&backend, &task_id).await {
            TaskStatus::Succeeded { artifacts } => {
                assert_eq!(artifacts.len(), 1);
                assert_eq!(artifacts[0].file_name, "result.json");
                let body: Value = serde_json::from_slice(&artifacts[0].data).unwrap();
                assert_eq!(body["echo"], "hi");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_params_fail_the_task() {
        let backend = LocalBackend::with_default_plugins(2);
        let task_id = backend
            .dispatch(spec(serde_json::json!({})))
            .await
            .unwrap();

        match wait_terminal(&backend, &task_id).await {
            TaskStatus::Failed { reason } => assert!(reason.contains("message")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_plugin_rejected_at_dispatch() {
        let backend = LocalBackend::with_default_plugins(2);
        let err = backend
            .dispatch(TaskSpec {
                correlation_id: Uuid::new_v4(),
                plugin_id: "nope".to_string(),
                params: Value::Null,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::UnknownPlugin(_)));
    }

    #[tokio::test]
    async fn cancel_running_task() {
        let backend = LocalBackend::with_default_plugins(2);
        let task_id = backend
            .dispatch(spec(
                serde_json::json!({ "message": "slow", "delay_ms": 10_000 }),
            ))
            .await
            .unwrap();

        // Give the task a moment to start.
        tokio::time::sleep(Duration::from_millis(50)).await;
        backend.cancel(&task_id).await.unwrap();

        assert!(matches!(
            backend.status(&task_id).await.unwrap(),
            TaskStatus::Cancelled
        ));
    }

    #[tokio::test]
    async fn cancel_after_completion_keeps_terminal_status() {
        let backend = LocalBackend::with_default_plugins(2);
        let task_id = backend
            .dispatch(spec(serde_json::json!({ "message": "hi" })))
            .await
            .unwrap();
        wait_terminal(&backend, &task_id).await;

        backend.cancel(&task_id).await.unwrap();
        assert!(matches!(
            backend.status(&task_id).await.unwrap(),
            TaskStatus::Succeeded { .. }
        ));
    }

    #[tokio::test]
    async fn unknown_task_id_reports_unknown() {
        let backend = LocalBackend::with_default_plugins(2);
        assert!(matches!(
            backend.status("no-such-task").await.unwrap(),
            TaskStatus::Unknown
        ));
    }

    #[tokio::test]
    async fn catalog_lists_registered_plugins() {
        let backend = LocalBackend::with_default_plugins(2);
        let plugins = backend.list_plugins().await.unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].plugin_id, "echo");
        assert!(plugins[0].has_demo());

        assert!(backend.get_plugin("echo").await.unwrap().is_some());
        assert!(backend.get_plugin("nope").await.unwrap().is_none());
    }
}

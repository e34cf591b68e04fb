//! Scripted worker backend for integration tests.

use async_trait::async_trait;
use relay_broker::{
    ArtifactPayload, BrokerError, BrokerResult, PluginCatalog, TaskSpec, TaskStatus, WorkerBackend,
};
use relay_core::PluginInfo;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// How the mock answers the next dispatch call.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum DispatchScript {
    /// Accept the task; subsequent status polls walk the sequence and
    /// then repeat its last entry.
    Accept(Vec<TaskStatus>),
    /// Report the backend as unreachable.
    Unavailable,
}

struct TaskScript {
    statuses: VecDeque<TaskStatus>,
    cancelled: bool,
}

/// Worker backend whose dispatch and status answers are scripted by the
/// test. Doubles as the plugin catalog, like the real backend does.
pub struct MockBackend {
    plugins: Vec<PluginInfo>,
    dispatch_scripts: Mutex<VecDeque<DispatchScript>>,
    tasks: Mutex<HashMap<String, TaskScript>>,
    dispatch_count: AtomicUsize,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new() -> Self {
        Self {
            plugins: vec![test_plugin()],
            dispatch_scripts: Mutex::new(VecDeque::new()),
            tasks: Mutex::new(HashMap::new()),
            dispatch_count: AtomicUsize::new(0),
        }
    }

    /// Queue the behavior for the next dispatch call. With an empty queue
    /// every dispatch reports the backend unavailable.
    pub fn script(&self, script: DispatchScript) {
        self.dispatch_scripts.lock().unwrap().push_back(script);
    }

    /// Register a task id with a status sequence, as if a previous server
    /// instance had dispatched it.
    pub fn preload_task(&self, task_id: &str, statuses: Vec<TaskStatus>) {
        self.tasks.lock().unwrap().insert(
            task_id.to_string(),
            TaskScript {
                statuses: statuses.into(),
                cancelled: false,
            },
        );
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatch_count.load(Ordering::SeqCst)
    }

    pub fn was_cancelled(&self, task_id: &str) -> bool {
        self.tasks
            .lock()
            .unwrap()
            .get(task_id)
            .is_some_and(|task| task.cancelled)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerBackend for MockBackend {
    async fn dispatch(&self, spec: TaskSpec) -> BrokerResult<String> {
        self.dispatch_count.fetch_add(1, Ordering::SeqCst);

        if !self.plugins.iter().any(|p| p.plugin_id == spec.plugin_id) {
            return Err(BrokerError::UnknownPlugin(spec.plugin_id));
        }

        let script = self.dispatch_scripts.lock().unwrap().pop_front();
        match script {
            Some(DispatchScript::Accept(statuses)) => {
                let task_id = Uuid::new_v4().to_string();
                self.tasks.lock().unwrap().insert(
                    task_id.clone(),
                    TaskScript {
                        statuses: statuses.into(),
                        cancelled: false,
                    },
                );
                Ok(task_id)
            }
            Some(DispatchScript::Unavailable) | None => {
                Err(BrokerError::Unavailable("scripted outage".to_string()))
            }
        }
    }

    async fn status(&self, task_id: &str) -> BrokerResult<TaskStatus> {
        let mut tasks = self.tasks.lock().unwrap();
        let Some(task) = tasks.get_mut(task_id) else {
            return Ok(TaskStatus::Unknown);
        };
        // Walk the sequence, holding on the last entry.
        if task.statuses.len() > 1 {
            Ok(task.statuses.pop_front().unwrap())
        } else {
            task.statuses
                .front()
                .cloned()
                .ok_or_else(|| BrokerError::Internal("empty status script".to_string()))
        }
    }

    async fn cancel(&self, task_id: &str) -> BrokerResult<()> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(task_id) {
            Some(task) => {
                task.cancelled = true;
                task.statuses = VecDeque::from([TaskStatus::Cancelled]);
                Ok(())
            }
            None => Err(BrokerError::UnknownTask(task_id.to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

#[async_trait]
impl PluginCatalog for MockBackend {
    async fn list_plugins(&self) -> BrokerResult<Vec<PluginInfo>> {
        Ok(self.plugins.clone())
    }

    async fn get_plugin(&self, plugin_id: &str) -> BrokerResult<Option<PluginInfo>> {
        Ok(self
            .plugins
            .iter()
            .find(|p| p.plugin_id == plugin_id)
            .cloned())
    }
}

/// The plugin advertised by the mock backend.
pub fn test_plugin() -> PluginInfo {
    PluginInfo {
        plugin_id: "render".to_string(),
        version: "2.1.0".to_string(),
        description: "Test rendering plugin".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": { "shape": { "type": "string" } },
            "required": ["shape"]
        }),
        demo_params: Some(json!({ "shape": "cube" })),
    }
}

/// A small artifact payload for scripted successes.
#[allow(dead_code)]
pub fn test_artifact(file_name: &str, content: &str) -> ArtifactPayload {
    ArtifactPayload {
        file_name: file_name.to_string(),
        media_type: "application/json".to_string(),
        data: content.as_bytes().to_vec().into(),
        label: Some("result".to_string()),
    }
}

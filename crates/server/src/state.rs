//! Application state shared across handlers.

use crate::admission::AdmissionLocks;
use crate::hub::NotificationHub;
use crate::lifecycle::Lifecycle;
use crate::sender::BackendSender;
use relay_broker::{PluginCatalog, WorkerBackend};
use relay_core::config::AppConfig;
use relay_registry::RegistryStore;
use relay_storage::{ObjectStore, UrlSigner};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Correlation registry.
    pub registry: Arc<dyn RegistryStore>,
    /// Artifact object store.
    pub storage: Arc<dyn ObjectStore>,
    /// Download URL signer.
    pub signer: Arc<UrlSigner>,
    /// Worker backend.
    pub backend: Arc<dyn WorkerBackend>,
    /// Plugin catalog.
    pub catalog: Arc<dyn PluginCatalog>,
    /// Live event fan-out.
    pub hub: Arc<NotificationHub>,
    /// Lifecycle commit path.
    pub lifecycle: Arc<Lifecycle>,
    /// Per-fingerprint admission locks.
    pub admission: Arc<AdmissionLocks>,
    /// Backend dispatch and reconciliation.
    pub sender: Arc<BackendSender>,
}

impl AppState {
    /// Wire up application state from its components.
    pub fn new(
        config: AppConfig,
        registry: Arc<dyn RegistryStore>,
        storage: Arc<dyn ObjectStore>,
        signer: UrlSigner,
        backend: Arc<dyn WorkerBackend>,
        catalog: Arc<dyn PluginCatalog>,
    ) -> Self {
        let hub = Arc::new(NotificationHub::new(config.server.heartbeat_interval()));
        let lifecycle = Arc::new(Lifecycle::new(registry.clone(), hub.clone()));
        let sender = Arc::new(BackendSender::new(
            registry.clone(),
            storage.clone(),
            backend.clone(),
            lifecycle.clone(),
            config.backend.clone(),
        ));

        Self {
            config: Arc::new(config),
            registry,
            storage,
            signer: Arc::new(signer),
            backend,
            catalog,
            hub,
            lifecycle,
            admission: Arc::new(AdmissionLocks::new()),
            sender,
        }
    }
}

//! Server test utilities.

use super::backend::MockBackend;
use relay_broker::{LocalBackend, PluginCatalog, WorkerBackend};
use relay_core::config::{
    AppConfig, RegistryConfig, SigningSecretConfig, StorageConfig,
};
use relay_server::{AppState, create_router};
use relay_storage::UrlSigner;
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server backed by the in-process echo backend.
    pub async fn new() -> Self {
        let config = AppConfig::for_testing();
        let local = Arc::new(LocalBackend::with_default_plugins(
            config.backend.max_concurrent_tasks,
        ));
        Self::build(config, local.clone(), local).await
    }

    /// Create a test server driven by a scripted mock backend.
    pub async fn with_mock(mock: Arc<MockBackend>) -> Self {
        Self::build(AppConfig::for_testing(), mock.clone(), mock).await
    }

    /// Create a test server with custom config modifications on top of
    /// the test defaults.
    pub async fn with_config<F>(mock: Arc<MockBackend>, modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = AppConfig::for_testing();
        modifier(&mut config);
        Self::build(config, mock.clone(), mock).await
    }

    async fn build(
        mut config: AppConfig,
        backend: Arc<dyn WorkerBackend>,
        catalog: Arc<dyn PluginCatalog>,
    ) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("artifacts");
        config.storage = StorageConfig::Filesystem {
            path: storage_path.clone(),
        };
        let db_path = temp_dir.path().join("registry.db");
        config.registry = RegistryConfig::Sqlite {
            path: db_path.clone(),
        };
        config.signing.secret = SigningSecretConfig::Value {
            key: "integration-test-secret-key".to_string(),
        };

        let storage = relay_storage::from_config(&config.storage)
            .await
            .expect("Failed to create storage backend");
        let registry = relay_registry::from_config(&config.registry)
            .await
            .expect("Failed to create registry store");
        let signer = UrlSigner::from_config(&config.signing.secret, config.signing.url_ttl())
            .expect("Failed to create signer");

        let state = AppState::new(config, registry, storage, signer, backend, catalog);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }
}

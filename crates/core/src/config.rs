//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Interval in milliseconds between heartbeat frames on idle
    /// subscription connections.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Enable request tracing.
    #[serde(default)]
    pub enable_tracing: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            enable_tracing: false,
        }
    }
}

impl ServerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// Correlation registry configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegistryConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/registry.db"),
        }
    }
}

/// Artifact storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for stored artifacts.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/artifacts"),
        }
    }
}

/// Signed-URL configuration for artifact downloads.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SigningConfig {
    /// HMAC secret source.
    pub secret: SigningSecretConfig,
    /// Lifetime of issued download URLs in seconds.
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
}

/// HMAC secret source configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SigningSecretConfig {
    /// Secret stored in a file.
    File {
        /// Path to the secret file.
        path: PathBuf,
    },
    /// Secret stored in an environment variable.
    Env {
        /// Environment variable name.
        var: String,
    },
    /// Secret provided directly as a value (NOT recommended for production).
    Value {
        /// The raw secret.
        key: String,
    },
    /// Generate a random secret at startup (for development only; issued
    /// URLs do not survive a restart).
    Generate,
}

fn default_url_ttl_secs() -> u64 {
    3600
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            secret: SigningSecretConfig::Generate,
            url_ttl_secs: default_url_ttl_secs(),
        }
    }
}

impl SigningConfig {
    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }
}

/// Worker backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Interval in milliseconds between backend status polls while a
    /// computation is non-terminal.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long in milliseconds a computation may remain unknown to the
    /// backend before the gateway declares it failed.
    #[serde(default = "default_grace_window_ms")]
    pub grace_window_ms: u64,
    /// Delay in milliseconds before retrying a backend call that reported
    /// the backend unavailable.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Maximum computations the in-process backend runs concurrently.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_grace_window_ms() -> u64 {
    60_000
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_max_concurrent_tasks() -> usize {
    4
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            grace_window_ms: default_grace_window_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
        }
    }
}

impl BackendConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Result cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable result reuse for identical submissions.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// How long in seconds a succeeded normal-class result stays reusable.
    /// Demo results never expire.
    #[serde(default = "default_cache_retention_secs")]
    pub retention_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_retention_secs() -> u64 {
    7 * 24 * 3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            retention_secs: default_cache_retention_secs(),
        }
    }
}

impl CacheConfig {
    pub fn retention(&self) -> time::Duration {
        let secs = i64::try_from(self.retention_secs).unwrap_or(i64::MAX);
        time::Duration::seconds(secs)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Correlation registry configuration.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Artifact storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Download URL signing configuration.
    #[serde(default)]
    pub signing: SigningConfig,
    /// Worker backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Result cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Create a test configuration with short timing intervals.
    ///
    /// **For testing only.** Registry and storage paths still need to be
    /// pointed at a temp directory by the caller.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                heartbeat_interval_ms: 50,
                ..ServerConfig::default()
            },
            backend: BackendConfig {
                poll_interval_ms: 20,
                grace_window_ms: 500,
                retry_backoff_ms: 20,
                max_concurrent_tasks: 4,
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_production_shaped() {
        let config = AppConfig::default();
        assert_eq!(config.server.heartbeat_interval_ms, 3000);
        assert_eq!(config.backend.poll_interval_ms, 1000);
        assert_eq!(config.backend.grace_window_ms, 60_000);
        assert_eq!(config.signing.url_ttl_secs, 3600);
        assert!(config.cache.enabled);
    }

    #[test]
    fn deserialize_partial_sections() {
        let json = r#"{"server": {"bind": "0.0.0.0:9000"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.heartbeat_interval_ms, 3000);
        assert!(matches!(config.registry, RegistryConfig::Sqlite { .. }));
    }

    #[test]
    fn signing_secret_tagged_roundtrip() {
        let json = r#"{"type":"env","var":"RELAY_SIGNING_SECRET"}"#;
        let secret: SigningSecretConfig = serde_json::from_str(json).unwrap();
        match secret {
            SigningSecretConfig::Env { var } => assert_eq!(var, "RELAY_SIGNING_SECRET"),
            other => panic!("expected env secret, got {other:?}"),
        }
    }
}

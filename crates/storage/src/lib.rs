//! Artifact storage abstraction for the relay gateway.
//!
//! Provides the object store trait, the filesystem backend, and
//! HMAC-signed download URLs for artifact retrieval.

pub mod backends;
pub mod error;
pub mod signer;
pub mod traits;

pub use backends::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use signer::{SignedUrl, UrlSigner};
pub use traits::{ObjectMeta, ObjectStore};

use relay_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend) as Arc<dyn ObjectStore>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::Filesystem {
            path: dir.path().join("artifacts"),
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert_eq!(store.backend_name(), "filesystem");
    }
}

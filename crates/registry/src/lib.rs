//! Correlation registry abstraction and SQLite implementation for Relay.
//!
//! This crate provides the control-plane data model:
//! - Computation lifecycle records keyed by correlation id
//! - Input fingerprints for deduplication and result caching
//! - Artifact records produced by succeeded computations

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{RegistryError, RegistryResult};
pub use store::{RegistryStore, SqliteStore};

use relay_core::config::RegistryConfig;
use std::sync::Arc;

/// Create a registry store from configuration.
pub async fn from_config(config: &RegistryConfig) -> RegistryResult<Arc<dyn RegistryStore>> {
    match config {
        RegistryConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn RegistryStore>)
        }
    }
}

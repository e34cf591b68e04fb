//! Registry store trait and SQLite implementation.

use crate::error::{RegistryError, RegistryResult};
use crate::repos::{ArtifactRepo, ComputationRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined registry store trait.
#[async_trait]
pub trait RegistryStore: ComputationRepo + ArtifactRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> RegistryResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> RegistryResult<()>;
}

/// SQLite-based registry store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store and apply the schema.
    pub async fn new(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection avoids
            // persistent "database is locked" failures under axum concurrency and
            // serializes state transitions.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl RegistryStore for SqliteStore {
    async fn migrate(&self) -> RegistryResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> RegistryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::{ArtifactRow, ComputationRow};
    use relay_core::{CacheClass, ComputationState};
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl ComputationRepo for SqliteStore {
        async fn create_computation(&self, row: &ComputationRow) -> RegistryResult<()> {
            if self.get_computation(row.correlation_id).await?.is_some() {
                return Err(RegistryError::AlreadyExists(format!(
                    "correlation_id {} already exists",
                    row.correlation_id
                )));
            }

            sqlx::query(
                "INSERT INTO computations (correlation_id, plugin_id, plugin_version, params_json, \
                 fingerprint, state, cache_class, error_message, backend_task_id, created_at, \
                 updated_at, finished_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.correlation_id)
            .bind(&row.plugin_id)
            .bind(&row.plugin_version)
            .bind(&row.params_json)
            .bind(&row.fingerprint)
            .bind(&row.state)
            .bind(&row.cache_class)
            .bind(&row.error_message)
            .bind(&row.backend_task_id)
            .bind(row.created_at)
            .bind(row.updated_at)
            .bind(row.finished_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_computation(
            &self,
            correlation_id: Uuid,
        ) -> RegistryResult<Option<ComputationRow>> {
            let row = sqlx::query_as::<_, ComputationRow>(
                "SELECT * FROM computations WHERE correlation_id = ?",
            )
            .bind(correlation_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn update_state(
            &self,
            correlation_id: Uuid,
            new_state: ComputationState,
            error_message: Option<&str>,
        ) -> RegistryResult<ComputationRow> {
            let mut tx = self.pool.begin().await?;

            let current = sqlx::query_as::<_, ComputationRow>(
                "SELECT * FROM computations WHERE correlation_id = ?",
            )
            .bind(correlation_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                RegistryError::NotFound(format!("computation {correlation_id}"))
            })?;

            let current_state = current.computation_state().ok_or_else(|| {
                RegistryError::Internal(format!(
                    "computation {} has corrupt state '{}'",
                    correlation_id, current.state
                ))
            })?;

            if !current_state.can_transition_to(new_state) {
                return Err(RegistryError::InvalidStateTransition {
                    from: current_state.as_str().to_string(),
                    to: new_state.as_str().to_string(),
                });
            }

            let now = OffsetDateTime::now_utc();
            let finished_at = new_state.is_terminal().then_some(now);

            sqlx::query(
                "UPDATE computations SET state = ?, error_message = ?, updated_at = ?, \
                 finished_at = ? WHERE correlation_id = ?",
            )
            .bind(new_state.as_str())
            .bind(error_message)
            .bind(now)
            .bind(finished_at)
            .bind(correlation_id)
            .execute(&mut *tx)
            .await?;

            let updated = sqlx::query_as::<_, ComputationRow>(
                "SELECT * FROM computations WHERE correlation_id = ?",
            )
            .bind(correlation_id)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(updated)
        }

        async fn set_backend_task(
            &self,
            correlation_id: Uuid,
            task_id: &str,
        ) -> RegistryResult<()> {
            let result = sqlx::query(
                "UPDATE computations SET backend_task_id = ?, updated_at = ? \
                 WHERE correlation_id = ?",
            )
            .bind(task_id)
            .bind(OffsetDateTime::now_utc())
            .bind(correlation_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(RegistryError::NotFound(format!(
                    "computation {correlation_id}"
                )));
            }
            Ok(())
        }

        async fn find_active_by_fingerprint(
            &self,
            fingerprint: &str,
        ) -> RegistryResult<Option<ComputationRow>> {
            let row = sqlx::query_as::<_, ComputationRow>(
                "SELECT * FROM computations \
                 WHERE fingerprint = ? AND state IN ('queued', 'running') \
                 ORDER BY created_at DESC LIMIT 1",
            )
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn find_latest_succeeded_by_fingerprint(
            &self,
            fingerprint: &str,
        ) -> RegistryResult<Option<ComputationRow>> {
            let row = sqlx::query_as::<_, ComputationRow>(
                "SELECT * FROM computations \
                 WHERE fingerprint = ? AND state = 'succeeded' \
                 ORDER BY finished_at DESC LIMIT 1",
            )
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_non_terminal(&self) -> RegistryResult<Vec<ComputationRow>> {
            let rows = sqlx::query_as::<_, ComputationRow>(
                "SELECT * FROM computations \
                 WHERE state IN ('queued', 'running') ORDER BY created_at ASC",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_recent(&self, limit: u32) -> RegistryResult<Vec<ComputationRow>> {
            let rows = sqlx::query_as::<_, ComputationRow>(
                "SELECT * FROM computations ORDER BY updated_at DESC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn purge_expired(&self, cutoff: OffsetDateTime) -> RegistryResult<u64> {
            let mut tx = self.pool.begin().await?;

            // Demo results never expire; disabled-class rows are never served
            // from cache but are purged on the same schedule as normal rows.
            sqlx::query(
                "DELETE FROM artifacts WHERE correlation_id IN (\
                     SELECT correlation_id FROM computations \
                     WHERE state = 'succeeded' AND cache_class != ? AND finished_at < ?)",
            )
            .bind(CacheClass::Demo.as_str())
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

            let result = sqlx::query(
                "DELETE FROM computations \
                 WHERE state = 'succeeded' AND cache_class != ? AND finished_at < ?",
            )
            .bind(CacheClass::Demo.as_str())
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(result.rows_affected())
        }
    }

    #[async_trait]
    impl ArtifactRepo for SqliteStore {
        async fn add_artifacts(&self, rows: &[ArtifactRow]) -> RegistryResult<()> {
            if rows.is_empty() {
                return Ok(());
            }

            let mut tx = self.pool.begin().await?;
            for row in rows {
                sqlx::query(
                    "INSERT INTO artifacts (artifact_id, correlation_id, object_key, media_type, \
                     size_bytes, label, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(row.artifact_id)
                .bind(row.correlation_id)
                .bind(&row.object_key)
                .bind(&row.media_type)
                .bind(row.size_bytes)
                .bind(&row.label)
                .bind(row.created_at)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(())
        }

        async fn list_artifacts(&self, correlation_id: Uuid) -> RegistryResult<Vec<ArtifactRow>> {
            let rows = sqlx::query_as::<_, ArtifactRow>(
                "SELECT * FROM artifacts WHERE correlation_id = ? ORDER BY created_at ASC",
            )
            .bind(correlation_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_artifact(
            &self,
            correlation_id: Uuid,
            artifact_id: Uuid,
        ) -> RegistryResult<Option<ArtifactRow>> {
            let row = sqlx::query_as::<_, ArtifactRow>(
                "SELECT * FROM artifacts WHERE correlation_id = ? AND artifact_id = ?",
            )
            .bind(correlation_id)
            .bind(artifact_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Computation lifecycle records, keyed by correlation id
CREATE TABLE IF NOT EXISTS computations (
    correlation_id BLOB PRIMARY KEY,
    plugin_id TEXT NOT NULL,
    plugin_version TEXT NOT NULL,
    params_json TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    state TEXT NOT NULL DEFAULT 'queued',
    cache_class TEXT NOT NULL DEFAULT 'normal',
    error_message TEXT,
    backend_task_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    finished_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_computations_fingerprint_state ON computations(fingerprint, state);
CREATE INDEX IF NOT EXISTS idx_computations_state ON computations(state, created_at);
CREATE INDEX IF NOT EXISTS idx_computations_updated ON computations(updated_at);

-- Artifacts produced by succeeded computations
CREATE TABLE IF NOT EXISTS artifacts (
    artifact_id BLOB PRIMARY KEY,
    correlation_id BLOB NOT NULL,
    object_key TEXT NOT NULL,
    media_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    label TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (correlation_id) REFERENCES computations(correlation_id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_artifacts_correlation ON artifacts(correlation_id, created_at);
"#;

// SQLite JobRepository Implementation

use async_trait::async_trait;
use conduit_core::domain::{ConnectorConfig, JobId, SyncJob};
use conduit_core::error::{AppError, Result};
use conduit_core::port::{JobRepository, TimeProvider};
use conduit_infra_crypto::SecretCodec;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info};

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Conflict(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "787" | "3850" => AppError::Validation(format!(
                        "Foreign key constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
        _ => AppError::Database(err.to_string()),
    }
}

#[derive(Debug, Clone, Copy)]
enum ConnectorTable {
    Sources,
    Destinations,
}

impl ConnectorTable {
    fn name(&self) -> &'static str {
        match self {
            ConnectorTable::Sources => "sources",
            ConnectorTable::Destinations => "destinations",
        }
    }

    fn job_column(&self) -> &'static str {
        match self {
            ConnectorTable::Sources => "source_id",
            ConnectorTable::Destinations => "dest_id",
        }
    }
}

/// Job repository over SQLite.
///
/// Connector configs are encrypted on every write and decrypted on every read;
/// a config that fails to decrypt fails the read.
pub struct SqliteJobRepository {
    pool: SqlitePool,
    codec: SecretCodec,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool, codec: SecretCodec, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            codec,
            time_provider,
        }
    }

    pub async fn insert_source(&self, source: &ConnectorConfig, project_id: &str) -> Result<i64> {
        self.insert_connector(ConnectorTable::Sources, source, project_id)
            .await
    }

    pub async fn insert_destination(
        &self,
        destination: &ConnectorConfig,
        project_id: &str,
    ) -> Result<i64> {
        self.insert_connector(ConnectorTable::Destinations, destination, project_id)
            .await
    }

    async fn insert_connector(
        &self,
        table: ConnectorTable,
        connector: &ConnectorConfig,
        project_id: &str,
    ) -> Result<i64> {
        let encrypted = self.codec.encrypt(&connector.config).await?;
        let now = self.time_provider.now_millis();

        let sql = format!(
            "INSERT INTO {} (name, type, version, config, project_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            table.name()
        );
        let result = sqlx::query(&sql)
            .bind(&connector.name)
            .bind(&connector.connector_type)
            .bind(&connector.version)
            .bind(&encrypted)
            .bind(project_id)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a job for already-stored source/destination ids
    pub async fn insert_job(&self, job: &SyncJob) -> Result<JobId> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (
                name, source_id, dest_id, frequency, streams_config, state,
                active, project_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.name)
        .bind(job.source.id)
        .bind(job.destination.id)
        .bind(&job.frequency)
        .bind(&job.streams_config)
        .bind(&job.state)
        .bind(job.active)
        .bind(&job.project_id)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let id = result.last_insert_rowid();
        info!(job_id = %id, project_id = %job.project_id, "Job inserted");
        Ok(id)
    }

    pub async fn soft_delete_job(&self, id: JobId) -> Result<()> {
        let now = self.time_provider.now_millis();
        let result = sqlx::query(
            "UPDATE jobs SET deleted_at = ?, active = 0, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("job {}", id)));
        }
        Ok(())
    }

    /// Soft-delete a source; its jobs become inactive
    pub async fn delete_source(&self, id: i64) -> Result<u64> {
        self.delete_connector(ConnectorTable::Sources, id).await
    }

    /// Soft-delete a destination; its jobs become inactive
    pub async fn delete_destination(&self, id: i64) -> Result<u64> {
        self.delete_connector(ConnectorTable::Destinations, id)
            .await
    }

    async fn delete_connector(&self, table: ConnectorTable, id: i64) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let sql = format!(
            "UPDATE {} SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
            table.name()
        );
        let deleted = sqlx::query(&sql)
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {}", table.name(), id)));
        }

        let sql = format!(
            "UPDATE jobs SET active = 0, updated_at = ? WHERE {} = ? AND deleted_at IS NULL",
            table.job_column()
        );
        let deactivated = sqlx::query(&sql)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        info!(
            table = %table.name(),
            id = %id,
            deactivated_jobs = %deactivated.rows_affected(),
            "Connector deleted, jobs deactivated"
        );
        Ok(deactivated.rows_affected())
    }

    async fn decrypt_config(&self, job_id: JobId, which: &str, config: &str) -> Result<String> {
        self.codec.decrypt(config).await.map_err(|e| {
            error!(job_id = %job_id, connector = %which, error = %e, "Failed to decrypt connector config");
            AppError::from(e)
        })
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn get_by_id(&self, id: JobId) -> Result<SyncJob> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT
                j.id, j.name, j.frequency, j.streams_config, j.state, j.active,
                j.project_id, j.created_at, j.updated_at, j.deleted_at,
                s.id AS source_id, s.name AS source_name, s.type AS source_type,
                s.version AS source_version, s.config AS source_config,
                d.id AS dest_id, d.name AS dest_name, d.type AS dest_type,
                d.version AS dest_version, d.config AS dest_config
            FROM jobs j
            JOIN sources s ON s.id = j.source_id
            JOIN destinations d ON d.id = j.dest_id
            WHERE j.id = ? AND j.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| AppError::NotFound(format!("job {}", id)))?;

        let source_config = self.decrypt_config(id, "source", &row.source_config).await?;
        let dest_config = self.decrypt_config(id, "destination", &row.dest_config).await?;

        Ok(row.into_job(source_config, dest_config))
    }

    async fn update(&self, job: &SyncJob) -> Result<()> {
        let now = self.time_provider.now_millis();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET name = ?, frequency = ?, streams_config = ?, state = ?, active = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&job.name)
        .bind(&job.frequency)
        .bind(&job.streams_config)
        .bind(&job.state)
        .bind(job.active)
        .bind(now)
        .bind(job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("job {}", job.id)));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    name: String,
    frequency: String,
    streams_config: String,
    state: String,
    active: bool,
    project_id: String,
    created_at: i64,
    updated_at: i64,
    deleted_at: Option<i64>,

    source_id: i64,
    source_name: String,
    source_type: String,
    source_version: String,
    source_config: String,

    dest_id: i64,
    dest_name: String,
    dest_type: String,
    dest_version: String,
    dest_config: String,
}

impl JobRow {
    fn into_job(self, source_config: String, dest_config: String) -> SyncJob {
        SyncJob {
            id: self.id,
            name: self.name,
            source: ConnectorConfig {
                id: self.source_id,
                name: self.source_name,
                connector_type: self.source_type,
                version: self.source_version,
                config: source_config,
            },
            destination: ConnectorConfig {
                id: self.dest_id,
                name: self.dest_name,
                connector_type: self.dest_type,
                version: self.dest_version,
                config: dest_config,
            },
            frequency: self.frequency,
            streams_config: self.streams_config,
            state: self.state,
            active: self.active,
            project_id: self.project_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use conduit_core::port::time_provider::mocks::FixedTimeProvider;

    async fn setup(codec: SecretCodec) -> (SqliteJobRepository, SqlitePool, Arc<FixedTimeProvider>) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let time = Arc::new(FixedTimeProvider::new(1_000));
        (
            SqliteJobRepository::new(pool.clone(), codec, time.clone()),
            pool,
            time,
        )
    }

    async fn seed(repo: &SqliteJobRepository) -> JobId {
        let mut job = SyncJob::new_test(0, "p1", "15-minutes");
        job.source.id = repo.insert_source(&job.source, "p1").await.unwrap();
        job.destination.id = repo
            .insert_destination(&job.destination, "p1")
            .await
            .unwrap();
        repo.insert_job(&job).await.unwrap()
    }

    #[tokio::test]
    async fn test_configs_encrypted_at_rest() {
        let (repo, pool, _) = setup(SecretCodec::local("test-key")).await;
        let id = seed(&repo).await;

        let stored: String = sqlx::query_scalar("SELECT config FROM sources LIMIT 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(!stored.contains("localhost"));

        let job = repo.get_by_id(id).await.unwrap();
        assert_eq!(job.source.config, r#"{"host":"localhost"}"#);
        assert_eq!(job.destination.config, r#"{"bucket":"lake"}"#);
        assert_eq!(job.source.connector_type, "postgres");
        assert_eq!(job.state, "{}");
    }

    #[tokio::test]
    async fn test_wrong_key_fails_read() {
        let (repo, pool, time) = setup(SecretCodec::local("key-a")).await;
        let id = seed(&repo).await;

        let other = SqliteJobRepository::new(pool, SecretCodec::local("key-b"), time);
        let err = other.get_by_id(id).await.unwrap_err();
        assert!(matches!(err, AppError::Crypto(_)));
    }

    #[tokio::test]
    async fn test_update_state() {
        let (repo, _pool, time) = setup(SecretCodec::local("k")).await;
        let id = seed(&repo).await;

        let mut job = repo.get_by_id(id).await.unwrap();
        job.record_checkpoint(&serde_json::json!({"cursor": 5}), 0)
            .unwrap();
        time.set(42_000);
        repo.update(&job).await.unwrap();

        let reloaded = repo.get_by_id(id).await.unwrap();
        assert_eq!(reloaded.state, r#"{"cursor":5}"#);
        assert_eq!(reloaded.updated_at, 42_000);
    }

    #[tokio::test]
    async fn test_missing_and_deleted_jobs() {
        let (repo, _pool, _) = setup(SecretCodec::local("k")).await;
        assert!(matches!(
            repo.get_by_id(404).await.unwrap_err(),
            AppError::NotFound(_)
        ));

        let id = seed(&repo).await;
        repo.soft_delete_job(id).await.unwrap();
        assert!(matches!(
            repo.get_by_id(id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(repo.soft_delete_job(id).await.is_err());
    }

    #[tokio::test]
    async fn test_deleting_source_deactivates_jobs() {
        let (repo, _pool, _) = setup(SecretCodec::local("k")).await;
        let id = seed(&repo).await;
        let source_id = repo.get_by_id(id).await.unwrap().source.id;

        let deactivated = repo.delete_source(source_id).await.unwrap();
        assert_eq!(deactivated, 1);
        assert!(!repo.get_by_id(id).await.unwrap().active);
    }
}

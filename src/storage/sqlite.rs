//! SQLite-backed log store.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::audit::AuditRecord;
use crate::error::StoreError;
use crate::storage::{LogStats, LogStore};

const DEPENDENCY: &str = "log_store";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS inference_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id TEXT NOT NULL UNIQUE,
    worker_id TEXT NOT NULL,
    input_hash TEXT NOT NULL,
    input_length INTEGER NOT NULL,
    prediction TEXT,
    confidence REAL,
    probabilities TEXT,
    cache_hit BOOLEAN NOT NULL DEFAULT 0,
    idempotency_hit BOOLEAN NOT NULL DEFAULT 0,
    success BOOLEAN NOT NULL DEFAULT 1,
    processing_time_ms REAL NOT NULL,
    inference_time_ms REAL,
    error_kind TEXT,
    error_message TEXT,
    idempotency_key TEXT,
    client_addr TEXT,
    created_at TEXT NOT NULL
)
"#;

const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_worker_created ON inference_logs (worker_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_success_created ON inference_logs (success, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_input_hash ON inference_logs (input_hash)",
];

/// `LogStore` writing to the `inference_logs` table.
#[derive(Debug, Clone)]
pub struct SqliteLogStore {
    pool: SqlitePool,
}

impl SqliteLogStore {
    /// Open (creating if missing) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(map_sqlx_error)?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if url.contains(":memory:") {
            // Each connection to an in-memory database sees its own empty database.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(map_sqlx_error)?;
        for statement in CREATE_INDEXES {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(map_sqlx_error)?;
        }

        tracing::info!(url = %url, "Log store connected");
        Ok(Self { pool })
    }
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn insert(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let probabilities = record
            .probabilities
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::backend(DEPENDENCY, e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO inference_logs (
                request_id, worker_id, input_hash, input_length, prediction, confidence,
                probabilities, cache_hit, idempotency_hit, success, processing_time_ms,
                inference_time_ms, error_kind, error_message, idempotency_key, client_addr,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.request_id)
        .bind(&record.worker_id)
        .bind(&record.input_hash)
        .bind(record.input_length as i64)
        .bind(&record.prediction)
        .bind(record.confidence)
        .bind(probabilities)
        .bind(record.cache_hit)
        .bind(record.idempotency_hit)
        .bind(record.success)
        .bind(record.processing_time_ms)
        .bind(record.inference_time_ms)
        .bind(&record.error_kind)
        .bind(&record.error_message)
        .bind(&record.idempotency_key)
        .bind(&record.client_addr)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StoreError::Duplicate {
                dependency: DEPENDENCY,
                key: record.request_id.clone(),
            }),
            Err(e) => Err(map_sqlx_error(e)),
        }
    }

    async fn stats(&self) -> Result<LogStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN success THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN cache_hit THEN 1 ELSE 0 END), 0),
                COALESCE(AVG(processing_time_ms), 0.0)
            FROM inference_logs
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let total: i64 = row.try_get(0).map_err(map_sqlx_error)?;
        let successes: i64 = row.try_get(1).map_err(map_sqlx_error)?;
        let cache_hits: i64 = row.try_get(2).map_err(map_sqlx_error)?;
        let avg: f64 = row.try_get(3).map_err(map_sqlx_error)?;

        Ok(LogStats::from_counts(
            total as u64,
            successes as u64,
            cache_hits as u64,
            avg,
        ))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        tracing::info!("Log store closed");
        Ok(())
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::unavailable(DEPENDENCY, err.to_string()),
        other => StoreError::backend(DEPENDENCY, other.to_string()),
    }
}

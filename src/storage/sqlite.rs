//! SQLite telemetry store
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Shared between ingestion, alerting and the API
//! - **Migrations**: Automatic schema versioning with sqlx

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::{TelemetryStore, validate};
use super::error::{StorageError, StorageResult};
use crate::Reading;

/// SQLite-backed store
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database file and run migrations
    ///
    /// ```no_run
    /// # use greenhouse_telemetry::storage::sqlite::SqliteStore;
    /// # async fn example() -> anyhow::Result<()> {
    /// let store = SqliteStore::new("./telemetry.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("database migrations complete");

        Ok(Self { pool })
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn row_to_reading(row: &SqliteRow) -> Reading {
        Reading {
            timestamp: Self::millis_to_timestamp(row.get("timestamp")),
            temperature: row.get("temperature"),
            humidity: row.get("humidity"),
            soil_moisture: row.get("soil_moisture"),
            co2_level: row.get::<i64, _>("co2_level").clamp(0, u32::MAX as i64) as u32,
            light_level: row.get("light_level"),
        }
    }
}

#[async_trait]
impl TelemetryStore for SqliteStore {
    #[instrument(skip_all, fields(timestamp = %reading.timestamp))]
    async fn insert(&self, reading: Reading) -> StorageResult<Reading> {
        validate(&reading)?;

        sqlx::query(
            r#"
            INSERT INTO readings (
                timestamp, temperature, humidity, soil_moisture, co2_level, light_level
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(reading.timestamp.timestamp_millis())
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.soil_moisture)
        .bind(reading.co2_level as i64)
        .bind(reading.light_level)
        .execute(&self.pool)
        .await?;

        Ok(reading)
    }

    #[instrument(skip(self))]
    async fn latest(&self, limit: usize) -> StorageResult<Vec<Reading>> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, temperature, humidity, soil_moisture, co2_level, light_level
            FROM readings
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        debug!("query returned {} readings", rows.len());
        Ok(rows.iter().map(Self::row_to_reading).collect())
    }

    #[instrument(skip(self), fields(since = %since))]
    async fn since(&self, since: DateTime<Utc>) -> StorageResult<Vec<Reading>> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, temperature, humidity, soil_moisture, co2_level, light_level
            FROM readings
            WHERE timestamp >= ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_reading).collect())
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn cleanup_before(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        info!("cleaning up readings older than {}", before);

        let result = sqlx::query("DELETE FROM readings WHERE timestamp < ?")
            .bind(before.timestamp_millis())
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() as usize;
        info!("deleted {} old readings", deleted);
        Ok(deleted)
    }

    async fn count(&self) -> StorageResult<usize> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM readings")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        Ok(count.max(0) as usize)
    }
}

//! PostgreSQL reading store with connection pooling

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::{NoTls, Row};
use tracing::debug;

use super::{ReadingStore, StoreError};
use crate::models::{NewReading, Reading};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sensor_data (
    id            BIGSERIAL PRIMARY KEY,
    timestamp     TIMESTAMPTZ NOT NULL,
    temperature   DOUBLE PRECISION NOT NULL,
    humidity      DOUBLE PRECISION NOT NULL,
    soil_moisture DOUBLE PRECISION NOT NULL,
    is_abnormal   BOOLEAN NOT NULL DEFAULT FALSE
);
CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp ON sensor_data (timestamp);
";

/// PostgreSQL-backed [`ReadingStore`]
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Build a pooled store from a `postgres://` connection string
    ///
    /// Connections are established lazily; call [`ReadingStore::ping`] to
    /// verify connectivity.
    pub fn connect(url: &str, max_pool_size: usize) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.url = Some(url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
        pool.resize(max_pool_size.max(1));

        Ok(Self { pool })
    }

    async fn client(&self) -> Result<deadpool_postgres::Client, StoreError> {
        Ok(self.pool.get().await?)
    }

    async fn query_readings(&self, sql: &str) -> Result<Vec<Reading>, StoreError> {
        let client = self.client().await?;
        let rows = client.query(sql, &[]).await?;
        rows.iter().map(row_to_reading).collect()
    }
}

/// Decode one row; a column of an unexpected type (a table created by an
/// older schema) is reported instead of panicking
fn row_to_reading(row: &Row) -> Result<Reading, StoreError> {
    let id: i64 = row.try_get("id").map_err(|e| StoreError::CorruptRow {
        id: 0,
        reason: format!("id: {}", e),
    })?;
    let corrupt = |column: &str, e: tokio_postgres::Error| StoreError::CorruptRow {
        id,
        reason: format!("{}: {}", column, e),
    };

    let timestamp: DateTime<Utc> = row
        .try_get("timestamp")
        .map_err(|e| corrupt("timestamp", e))?;

    Ok(Reading {
        id,
        timestamp,
        temperature: row
            .try_get("temperature")
            .map_err(|e| corrupt("temperature", e))?,
        humidity: row
            .try_get("humidity")
            .map_err(|e| corrupt("humidity", e))?,
        soil_moisture: row
            .try_get("soil_moisture")
            .map_err(|e| corrupt("soil_moisture", e))?,
        is_abnormal: row
            .try_get("is_abnormal")
            .map_err(|e| corrupt("is_abnormal", e))?,
    })
}

#[async_trait]
impl ReadingStore for PostgresStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.client().await?;
        client.batch_execute(SCHEMA).await?;
        debug!("postgres schema ensured");
        Ok(())
    }

    async fn insert(&self, reading: NewReading) -> Result<Reading, StoreError> {
        let client = self.client().await?;

        let row = client
            .query_one(
                "INSERT INTO sensor_data (timestamp, temperature, humidity, soil_moisture, is_abnormal)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING id",
                &[
                    &reading.timestamp,
                    &reading.temperature,
                    &reading.humidity,
                    &reading.soil_moisture,
                    &reading.is_abnormal,
                ],
            )
            .await?;

        let id: i64 = row.try_get(0)?;
        debug!(id, "Inserted reading into postgres");
        Ok(Reading::from_new(id, reading))
    }

    async fn history(&self) -> Result<Vec<Reading>, StoreError> {
        self.query_readings(
            "SELECT id, timestamp, temperature, humidity, soil_moisture, is_abnormal
             FROM sensor_data
             ORDER BY timestamp DESC, id DESC",
        )
        .await
    }

    async fn abnormal_history(&self) -> Result<Vec<Reading>, StoreError> {
        self.query_readings(
            "SELECT id, timestamp, temperature, humidity, soil_moisture, is_abnormal
             FROM sensor_data
             WHERE is_abnormal
             ORDER BY timestamp DESC, id DESC",
        )
        .await
    }

    async fn abnormal_count(&self) -> Result<u64, StoreError> {
        let client = self.client().await?;
        let row = client
            .query_one("SELECT COUNT(*) FROM sensor_data WHERE is_abnormal", &[])
            .await?;
        let count: i64 = row.try_get(0)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let client = self.client().await?;
        client.execute("SELECT 1", &[]).await?;
        debug!("postgreSQL connection successful");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

//! SQLite reading store
//!
//! A single connection guarded by a mutex; every query runs on the blocking
//! thread pool. Timestamps are stored as microseconds since the Unix epoch.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{ReadingStore, StoreError};
use crate::models::{NewReading, Reading};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sensor_data (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp_us  INTEGER NOT NULL,
    temperature   REAL NOT NULL,
    humidity      REAL NOT NULL,
    soil_moisture REAL NOT NULL,
    is_abnormal   INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp ON sensor_data (timestamp_us);
";

const SELECT_READINGS: &str = "
SELECT id, timestamp_us, temperature, humidity, soil_moisture, is_abnormal
FROM sensor_data";

const ORDER_NEWEST_FIRST: &str = "ORDER BY timestamp_us DESC, id DESC";

/// SQLite-backed [`ReadingStore`]
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Task("sqlite connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn query_readings(conn: &Connection, sql: &str) -> Result<Vec<Reading>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, f64>(4)?,
            row.get::<_, bool>(5)?,
        ))
    })?;

    let mut readings = Vec::new();
    for row in rows {
        let (id, timestamp_us, temperature, humidity, soil_moisture, is_abnormal) = row?;
        let timestamp = Utc
            .timestamp_micros(timestamp_us)
            .single()
            .ok_or_else(|| StoreError::CorruptRow {
                id,
                reason: format!("timestamp {} out of range", timestamp_us),
            })?;

        readings.push(Reading {
            id,
            timestamp,
            temperature,
            humidity,
            soil_moisture,
            is_abnormal,
        });
    }

    Ok(readings)
}

#[async_trait]
impl ReadingStore for SqliteStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
    }

    async fn insert(&self, reading: NewReading) -> Result<Reading, StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sensor_data (timestamp_us, temperature, humidity, soil_moisture, is_abnormal)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    reading.timestamp.timestamp_micros(),
                    reading.temperature,
                    reading.humidity,
                    reading.soil_moisture,
                    reading.is_abnormal,
                ],
            )?;

            let id = conn.last_insert_rowid();
            debug!(id, "Inserted reading into sqlite");
            Ok(Reading::from_new(id, reading))
        })
        .await
    }

    async fn history(&self) -> Result<Vec<Reading>, StoreError> {
        self.with_conn(|conn| {
            query_readings(conn, &format!("{} {}", SELECT_READINGS, ORDER_NEWEST_FIRST))
        })
        .await
    }

    async fn abnormal_history(&self) -> Result<Vec<Reading>, StoreError> {
        self.with_conn(|conn| {
            query_readings(
                conn,
                &format!(
                    "{} WHERE is_abnormal = 1 {}",
                    SELECT_READINGS, ORDER_NEWEST_FIRST
                ),
            )
        })
        .await
    }

    async fn abnormal_count(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sensor_data WHERE is_abnormal = 1",
                [],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

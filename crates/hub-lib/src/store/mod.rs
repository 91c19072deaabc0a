//! Persistence of sensor readings
//!
//! Readings are stored in a single relational table. Two backends are
//! provided behind the [`ReadingStore`] trait:
//! - SQLite (bundled), for local deployments and tests
//! - PostgreSQL, through a `deadpool` connection pool
//!
//! The backend is picked from the database URL scheme.

mod postgres;
mod sqlite;

pub use crate::error::StoreError;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

use crate::models::{NewReading, Reading};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Default PostgreSQL pool size
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Trait for reading persistence implementations
///
/// Every query returns readings newest first, ties broken by id.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Create the table and index if they do not exist
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Insert a classified reading and return it with its assigned id
    async fn insert(&self, reading: NewReading) -> Result<Reading, StoreError>;

    /// All readings, newest first
    async fn history(&self) -> Result<Vec<Reading>, StoreError>;

    /// Readings flagged abnormal, newest first
    async fn abnormal_history(&self) -> Result<Vec<Reading>, StoreError>;

    /// Number of readings flagged abnormal
    async fn abnormal_count(&self) -> Result<u64, StoreError>;

    /// Verify the backend is reachable
    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}

/// Parsed database connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
    SqliteMemory,
    SqliteFile(PathBuf),
    Postgres(String),
}

impl DatabaseUrl {
    /// Parse a connection string
    ///
    /// SQLite accepts `sqlite::memory:`, `sqlite:<path>`, `sqlite://<path>`
    /// and the three-slash form `sqlite:///<relative path>`, where an absolute
    /// path takes a fourth slash (`sqlite:////var/lib/hub/data.db`).
    pub fn parse(url: &str) -> Result<Self, StoreError> {
        let url = url.trim();

        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(DatabaseUrl::Postgres(url.to_string()));
        }

        let path = match url.strip_prefix("sqlite://") {
            Some(rest) => rest.strip_prefix('/').unwrap_or(rest),
            None => url
                .strip_prefix("sqlite:")
                .ok_or_else(|| StoreError::UnsupportedUrl(url.to_string()))?,
        };

        match path {
            "" => Err(StoreError::UnsupportedUrl(url.to_string())),
            ":memory:" => Ok(DatabaseUrl::SqliteMemory),
            path => Ok(DatabaseUrl::SqliteFile(PathBuf::from(path))),
        }
    }
}

/// Open the store named by `url` and make sure its schema exists
pub async fn open_store(url: &str, pool_size: usize) -> Result<Arc<dyn ReadingStore>, StoreError> {
    let store: Arc<dyn ReadingStore> = match DatabaseUrl::parse(url)? {
        DatabaseUrl::SqliteMemory => {
            tracing::info!("Using in-memory SQLite store");
            Arc::new(SqliteStore::open_in_memory()?)
        }
        DatabaseUrl::SqliteFile(path) => {
            tracing::info!(path = %path.display(), "Using SQLite store");
            Arc::new(SqliteStore::open(&path)?)
        }
        DatabaseUrl::Postgres(url) => {
            tracing::info!(pool_size, "Using PostgreSQL store");
            Arc::new(PostgresStore::connect(&url, pool_size)?)
        }
    };

    store.ensure_schema().await?;
    Ok(store)
}

//! Error types for the sensor hub

use thiserror::Error;

/// Errors raised by a reading store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("failed to create connection pool: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    #[error("failed to get pooled connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("corrupt row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Errors surfaced by hub operations
#[derive(Debug, Error)]
pub enum HubError {
    #[error("invalid reading: {0}")]
    InvalidReading(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type HubResult<T> = std::result::Result<T, HubError>;

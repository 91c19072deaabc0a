//! Core library for the sensor hub
//!
//! This crate provides the core functionality for:
//! - Threshold classification of sensor readings
//! - Persistence of readings (SQLite and PostgreSQL)
//! - Live-update fan-out to connected subscribers
//! - CSV export of the reading history
//! - Health checks and observability

pub mod anomaly;
pub mod error;
pub mod export;
pub mod health;
pub mod live;
pub mod models;
pub mod observability;
pub mod service;
pub mod store;
pub mod time;

pub use error::{HubError, HubResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use live::{LiveChannel, LiveEvent};
pub use models::*;
pub use observability::{HubMetrics, StructuredLogger};
pub use service::SensorHub;
pub use store::{open_store, ReadingStore, StoreError};

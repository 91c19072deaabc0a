//! Observability infrastructure for the sensor hub
//!
//! Provides:
//! - Prometheus metrics (ingest counts, ingest latency, live subscribers, store errors)
//! - Structured JSON logging with tracing

use prometheus::{register_histogram, register_int_counter, register_int_gauge};
use prometheus::{Histogram, IntCounter, IntGauge};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::models::{AbnormalType, Reading};

/// Histogram buckets for ingest latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

static GLOBAL_METRICS: OnceLock<HubMetricsInner> = OnceLock::new();

struct HubMetricsInner {
    readings_ingested: IntCounter,
    abnormal_readings: IntCounter,
    ingest_latency_seconds: Histogram,
    live_subscribers: IntGauge,
    store_errors: IntCounter,
}

impl HubMetricsInner {
    fn new() -> Self {
        Self {
            readings_ingested: register_int_counter!(
                "sensor_hub_readings_ingested_total",
                "Total number of readings accepted and stored"
            )
            .expect("Failed to register readings_ingested_total"),

            abnormal_readings: register_int_counter!(
                "sensor_hub_abnormal_readings_total",
                "Total number of stored readings flagged abnormal"
            )
            .expect("Failed to register abnormal_readings_total"),

            ingest_latency_seconds: register_histogram!(
                "sensor_hub_ingest_latency_seconds",
                "Time spent classifying, storing and publishing a reading",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register ingest_latency_seconds"),

            live_subscribers: register_int_gauge!(
                "sensor_hub_live_subscribers",
                "Number of clients subscribed to the live channel"
            )
            .expect("Failed to register live_subscribers"),

            store_errors: register_int_counter!(
                "sensor_hub_store_errors_total",
                "Total number of failed store operations"
            )
            .expect("Failed to register store_errors_total"),
        }
    }
}

/// Handle to the process-wide hub metrics
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct HubMetrics {
    _private: (),
}

impl Default for HubMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HubMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(HubMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &HubMetricsInner {
        GLOBAL_METRICS.get_or_init(HubMetricsInner::new)
    }

    /// Count a stored reading
    pub fn record_reading(&self, is_abnormal: bool) {
        self.inner().readings_ingested.inc();
        if is_abnormal {
            self.inner().abnormal_readings.inc();
        }
    }

    pub fn observe_ingest_latency(&self, duration_secs: f64) {
        self.inner().ingest_latency_seconds.observe(duration_secs);
    }

    pub fn set_live_subscribers(&self, count: usize) {
        self.inner()
            .live_subscribers
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn inc_store_errors(&self) {
        self.inner().store_errors.inc();
    }
}

/// Structured logger for hub events
///
/// Every entry carries an `event` field so log pipelines can filter on it.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_reading(&self, reading: &Reading) {
        info!(
            event = "reading_ingested",
            instance = %self.instance,
            id = reading.id,
            temperature = reading.temperature,
            humidity = reading.humidity,
            soil_moisture = reading.soil_moisture,
            is_abnormal = reading.is_abnormal,
            "Stored sensor reading"
        );
    }

    pub fn log_abnormal(&self, reading: &Reading, violations: &[AbnormalType]) {
        let violations = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        warn!(
            event = "abnormal_reading",
            instance = %self.instance,
            id = reading.id,
            temperature = reading.temperature,
            humidity = reading.humidity,
            soil_moisture = reading.soil_moisture,
            violations = %violations,
            "Abnormal sensor reading"
        );
    }

    pub fn log_subscriber_connected(&self, subscribers: usize) {
        info!(
            event = "live_subscriber_connected",
            instance = %self.instance,
            subscribers = subscribers,
            "Live subscriber connected"
        );
    }

    pub fn log_startup(&self, version: &str, backend: &str) {
        info!(
            event = "hub_started",
            instance = %self.instance,
            hub_version = %version,
            store_backend = %backend,
            "Sensor hub started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "hub_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Sensor hub shutting down"
        );
    }
}

//! Server context shared by every request handler
//!
//! [`SensorHub`] owns the store, the detector, the live channel and the
//! observability handles. It is built once at startup and handed to the
//! HTTP layer; the ingestion path is classify → persist → publish.

use chrono::{SubsecRound, Utc};
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Instant;

use crate::anomaly::{ThresholdDetector, Thresholds};
use crate::error::{HubError, HubResult, StoreError};
use crate::export;
use crate::health::{components, HealthRegistry};
use crate::live::{LiveChannel, LiveEvent, LiveSubscription};
use crate::models::{
    AbnormalCount, AbnormalHistoryEntry, HistoryEntry, NewReading, Reading, SensorPayload,
};
use crate::observability::{HubMetrics, StructuredLogger};
use crate::store::ReadingStore;
use crate::time::LocalZone;

pub struct SensorHub {
    store: Arc<dyn ReadingStore>,
    detector: ThresholdDetector,
    live: LiveChannel,
    zone: LocalZone,
    health: HealthRegistry,
    metrics: HubMetrics,
    logger: StructuredLogger,
}

impl SensorHub {
    /// Create a hub over `store` with default thresholds, zone and channel
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self {
            store,
            detector: ThresholdDetector::default(),
            live: LiveChannel::default(),
            zone: LocalZone::default(),
            health: HealthRegistry::new(),
            metrics: HubMetrics::new(),
            logger: StructuredLogger::new("sensor-hub"),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.detector = ThresholdDetector::new(thresholds);
        self
    }

    pub fn with_zone(mut self, zone: LocalZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn with_live_channel(mut self, live: LiveChannel) -> Self {
        self.live = live;
        self
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    pub fn detector(&self) -> &ThresholdDetector {
        &self.detector
    }

    pub fn live(&self) -> &LiveChannel {
        &self.live
    }

    pub fn zone(&self) -> &LocalZone {
        &self.zone
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Classify, persist and publish one reading
    ///
    /// Nothing is stored or published when the payload is rejected, and
    /// publishing never fails the call.
    pub async fn ingest(&self, payload: SensorPayload) -> HubResult<Reading> {
        let started = Instant::now();

        if !payload.is_finite() {
            return Err(HubError::InvalidReading(
                "measurements must be finite numbers".to_string(),
            ));
        }

        let violations = self.detector.violations(&payload);
        let new_reading = NewReading {
            // Both backends keep microsecond precision
            timestamp: Utc::now().trunc_subsecs(6),
            temperature: payload.temperature,
            humidity: payload.humidity,
            soil_moisture: payload.soil_moisture,
            is_abnormal: !violations.is_empty(),
        };

        let reading = self.track_store(self.store.insert(new_reading).await).await?;

        self.metrics.record_reading(reading.is_abnormal);
        self.logger.log_reading(&reading);
        if reading.is_abnormal {
            self.logger.log_abnormal(&reading, &violations);
        }

        for event in LiveEvent::for_reading(&reading, &self.zone) {
            self.live.publish(event);
        }
        self.metrics
            .set_live_subscribers(self.live.subscriber_count());

        self.metrics
            .observe_ingest_latency(started.elapsed().as_secs_f64());
        Ok(reading)
    }

    /// Every reading, newest first
    pub async fn history(&self) -> HubResult<Vec<HistoryEntry>> {
        let readings = self.track_store(self.store.history().await).await?;
        Ok(readings
            .iter()
            .map(|r| r.to_history_entry(&self.zone))
            .collect())
    }

    /// Abnormal readings, newest first, each labelled with its
    /// highest-priority violation
    pub async fn abnormal_history(&self) -> HubResult<Vec<AbnormalHistoryEntry>> {
        let readings = self
            .track_store(self.store.abnormal_history().await)
            .await?;

        Ok(readings
            .iter()
            .map(|r| AbnormalHistoryEntry {
                timestamp: self.zone.format(r.timestamp),
                abnormal_type: self.detector.label(r),
            })
            .collect())
    }

    pub async fn abnormal_count(&self) -> HubResult<AbnormalCount> {
        let count = self.track_store(self.store.abnormal_count().await).await?;
        Ok(AbnormalCount { count })
    }

    /// CSV lines (header first) for every reading, newest first
    pub async fn export_csv(&self) -> HubResult<BoxStream<'static, String>> {
        let readings = self.track_store(self.store.history().await).await?;
        Ok(export::csv_stream(readings, self.zone).boxed())
    }

    /// Probe the store, recording the outcome in health
    pub async fn check_store(&self) -> HubResult<()> {
        self.track_store(self.store.ping().await).await
    }

    /// Subscribe to the live channel
    pub fn subscribe(&self) -> LiveSubscription {
        let subscription = self.live.subscribe();
        let subscribers = self.live.subscriber_count();

        self.metrics.set_live_subscribers(subscribers);
        self.logger.log_subscriber_connected(subscribers);
        subscription
    }

    /// Sync the subscriber gauge with the channel and return the count
    ///
    /// Disconnected subscribers only leave the channel when their stream is
    /// dropped, so this runs before every metrics scrape.
    pub fn refresh_live_subscribers(&self) -> usize {
        let subscribers = self.live.subscriber_count();
        self.metrics.set_live_subscribers(subscribers);
        subscribers
    }

    /// Feed a store outcome into health and metrics
    async fn track_store<T>(&self, result: Result<T, StoreError>) -> HubResult<T> {
        match result {
            Ok(value) => {
                self.health.record_success(components::STORE).await;
                Ok(value)
            }
            Err(e) => {
                self.metrics.inc_store_errors();
                self.health
                    .record_failure(components::STORE, e.to_string())
                    .await;
                tracing::error!(
                    error = %e,
                    backend = self.store.backend(),
                    "Store operation failed"
                );
                Err(e.into())
            }
        }
    }
}

//! Live-update fan-out
//!
//! Every accepted reading is published on a broadcast topic as an `update`
//! event, followed by a `notification` event when the reading is abnormal.
//! Delivery is best-effort and at-most-once: publishing never blocks and
//! never fails, and a subscriber that falls behind the buffer skips the
//! events it missed.

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt as _;
use tracing::{debug, warn};

use crate::models::{HistoryEntry, Reading};
use crate::time::LocalZone;

/// Default number of events buffered per subscriber
pub const DEFAULT_LIVE_CAPACITY: usize = 100;

/// Message carried by every `notification` event
pub const ABNORMAL_MESSAGE: &str = "Abnormal data detected!";

/// Measurements attached to a `notification` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub data: NotificationData,
}

/// An event pushed to live subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Update(HistoryEntry),
    Notification(Notification),
}

impl LiveEvent {
    /// Events to publish for a freshly stored reading, in order
    pub fn for_reading(reading: &Reading, zone: &LocalZone) -> Vec<LiveEvent> {
        let update = reading.to_history_entry(zone);
        let mut events = Vec::with_capacity(2);

        if reading.is_abnormal {
            let notification = Notification {
                message: ABNORMAL_MESSAGE.to_string(),
                data: NotificationData {
                    temperature: update.temperature,
                    humidity: update.humidity,
                    soil_moisture: update.soil_moisture,
                    timestamp: update.timestamp.clone(),
                },
            };
            events.push(LiveEvent::Update(update));
            events.push(LiveEvent::Notification(notification));
        } else {
            events.push(LiveEvent::Update(update));
        }

        events
    }

    /// Event name used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::Update(_) => "update",
            LiveEvent::Notification(_) => "notification",
        }
    }

    /// JSON payload of the event
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            LiveEvent::Update(update) => serde_json::to_string(update),
            LiveEvent::Notification(notification) => serde_json::to_string(notification),
        }
    }
}

/// Broadcast topic shared by the ingestion path and all subscribers
#[derive(Debug, Clone)]
pub struct LiveChannel {
    tx: broadcast::Sender<LiveEvent>,
}

impl Default for LiveChannel {
    fn default() -> Self {
        Self::new(DEFAULT_LIVE_CAPACITY)
    }
}

impl LiveChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to every current subscriber
    ///
    /// Returns the number of subscribers the event was queued for; zero
    /// when nobody is listening.
    pub fn publish(&self, event: LiveEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(event = name, receivers, "Published live event");
                receivers
            }
            Err(_) => {
                debug!(event = name, "No live subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> LiveSubscription {
        LiveSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One subscriber's view of the live channel
#[derive(Debug)]
pub struct LiveSubscription {
    rx: broadcast::Receiver<LiveEvent>,
}

impl LiveSubscription {
    /// Wait for the next event, skipping any that were dropped
    ///
    /// Returns `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<LiveEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Live subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next buffered event without waiting
    pub fn try_recv(&mut self) -> Option<LiveEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Live subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Convert into a stream that skips lagged events
    pub fn into_stream(self) -> impl Stream<Item = LiveEvent> + Send + 'static {
        BroadcastStream::new(self.rx).filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Live stream lagged, events dropped");
                None
            }
        })
    }
}

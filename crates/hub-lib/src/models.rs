//! Core data models for the sensor hub

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::LocalZone;

/// Measurements posted by a sensor node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorPayload {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
}

impl SensorPayload {
    pub fn new(temperature: f64, humidity: f64, soil_moisture: f64) -> Self {
        Self {
            temperature,
            humidity,
            soil_moisture,
        }
    }

    /// Returns true if every measurement is a finite number
    pub fn is_finite(&self) -> bool {
        self.temperature.is_finite() && self.humidity.is_finite() && self.soil_moisture.is_finite()
    }
}

/// A classified reading that has not been assigned an id yet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewReading {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub is_abnormal: bool,
}

/// A persisted reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub is_abnormal: bool,
}

impl Reading {
    pub fn from_new(id: i64, new: NewReading) -> Self {
        Self {
            id,
            timestamp: new.timestamp,
            temperature: new.temperature,
            humidity: new.humidity,
            soil_moisture: new.soil_moisture,
            is_abnormal: new.is_abnormal,
        }
    }

    pub fn payload(&self) -> SensorPayload {
        SensorPayload::new(self.temperature, self.humidity, self.soil_moisture)
    }

    pub fn to_history_entry(&self, zone: &LocalZone) -> HistoryEntry {
        HistoryEntry {
            id: self.id,
            timestamp: zone.format(self.timestamp),
            temperature: self.temperature,
            humidity: self.humidity,
            soil_moisture: self.soil_moisture,
            is_abnormal: self.is_abnormal,
        }
    }
}

/// Which measurement made a reading abnormal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbnormalType {
    Temperature,
    Humidity,
    #[serde(rename = "Soil Moisture")]
    SoilMoisture,
    Unknown,
}

impl std::fmt::Display for AbnormalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbnormalType::Temperature => write!(f, "Temperature"),
            AbnormalType::Humidity => write!(f, "Humidity"),
            AbnormalType::SoilMoisture => write!(f, "Soil Moisture"),
            AbnormalType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Row of `GET /history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub is_abnormal: bool,
}

/// Row of `GET /abnormal-history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbnormalHistoryEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub abnormal_type: AbnormalType,
}

/// Body of `GET /abnormal-count`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbnormalCount {
    pub count: u64,
}

/// Plain `{message}` body used by ingestion and error responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

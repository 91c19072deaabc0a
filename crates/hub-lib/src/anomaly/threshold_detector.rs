//! Static threshold detection
//!
//! Flags a reading when any measurement falls outside its closed interval.

use serde::{Deserialize, Serialize};

use crate::models::{AbnormalType, Reading, SensorPayload};

/// Closed interval `[min, max]` a measurement must stay within
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Both ends are inclusive
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// Normal operating ranges for each measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub temperature: Bounds,
    pub humidity: Bounds,
    pub soil_moisture: Bounds,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature: Bounds::new(20.0, 50.0),
            humidity: Bounds::new(30.0, 90.0),
            soil_moisture: Bounds::new(5.0, 95.0),
        }
    }
}

impl Thresholds {
    pub fn is_valid(&self) -> bool {
        self.temperature.is_valid() && self.humidity.is_valid() && self.soil_moisture.is_valid()
    }
}

/// Classifies readings against static thresholds
#[derive(Debug, Clone, Default)]
pub struct ThresholdDetector {
    thresholds: Thresholds,
}

impl ThresholdDetector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// True if any measurement is outside its range
    pub fn is_abnormal(&self, payload: &SensorPayload) -> bool {
        self.classify(payload).is_some()
    }

    /// First violated measurement in priority order
    /// temperature > humidity > soil moisture
    pub fn classify(&self, payload: &SensorPayload) -> Option<AbnormalType> {
        self.violations(payload).into_iter().next()
    }

    /// Every violated measurement, highest priority first
    pub fn violations(&self, payload: &SensorPayload) -> Vec<AbnormalType> {
        let checks = [
            (
                AbnormalType::Temperature,
                self.thresholds.temperature,
                payload.temperature,
            ),
            (
                AbnormalType::Humidity,
                self.thresholds.humidity,
                payload.humidity,
            ),
            (
                AbnormalType::SoilMoisture,
                self.thresholds.soil_moisture,
                payload.soil_moisture,
            ),
        ];

        checks
            .into_iter()
            .filter(|(_, bounds, value)| !bounds.contains(*value))
            .map(|(kind, _, _)| kind)
            .collect()
    }

    /// Label for a stored reading's abnormal-history row
    ///
    /// `Unknown` only when the row was flagged under thresholds that have
    /// since been reconfigured.
    pub fn label(&self, reading: &Reading) -> AbnormalType {
        self.classify(&reading.payload()).unwrap_or(AbnormalType::Unknown)
    }
}

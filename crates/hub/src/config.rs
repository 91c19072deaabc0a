//! Hub configuration

use anyhow::{bail, Context, Result};
use hub_lib::anomaly::{Bounds, Thresholds};
use hub_lib::live::DEFAULT_LIVE_CAPACITY;
use hub_lib::store::DEFAULT_POOL_SIZE;
use hub_lib::time::{LocalZone, DEFAULT_UTC_OFFSET_HOURS};
use serde::Deserialize;
use std::collections::HashMap;

/// Hub configuration
///
/// Read from `HUB_*` environment variables; nested keys use `__`
/// (`HUB_THRESHOLDS__TEMPERATURE_MAX=45`).
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Store connection string, `DATABASE_URL` when unset
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// HTTP listen port, `PORT` when unset
    #[serde(default = "default_port")]
    pub port: u16,

    /// Name attached to structured log entries
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Whole-hour UTC offset used to render timestamps
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Events buffered per live subscriber
    #[serde(default = "default_live_capacity")]
    pub live_capacity: usize,

    /// PostgreSQL connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

/// Closed ranges outside of which a measurement is abnormal
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
    pub soil_moisture_min: f64,
    pub soil_moisture_max: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let defaults = Thresholds::default();
        Self {
            temperature_min: defaults.temperature.min,
            temperature_max: defaults.temperature.max,
            humidity_min: defaults.humidity.min,
            humidity_max: defaults.humidity.max,
            soil_moisture_min: defaults.soil_moisture.min,
            soil_moisture_max: defaults.soil_moisture.max,
        }
    }
}

impl ThresholdConfig {
    pub fn to_thresholds(&self) -> Result<Thresholds> {
        let thresholds = Thresholds {
            temperature: Bounds::new(self.temperature_min, self.temperature_max),
            humidity: Bounds::new(self.humidity_min, self.humidity_max),
            soil_moisture: Bounds::new(self.soil_moisture_min, self.soil_moisture_max),
        };

        if !thresholds.is_valid() {
            bail!(
                "Invalid thresholds, every min must be finite and not above its max: {:?}",
                self
            );
        }
        Ok(thresholds)
    }
}

fn default_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://sensor_data.db".to_string())
}

fn default_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(8080)
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "sensor-hub".to_string())
}

fn default_utc_offset_hours() -> i32 {
    DEFAULT_UTC_OFFSET_HOURS
}

fn default_live_capacity() -> usize {
    DEFAULT_LIVE_CAPACITY
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl HubConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_env(None)
    }

    /// Load configuration from `vars` instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_env(Some(vars))
    }

    fn from_env(source: Option<HashMap<String, String>>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("HUB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(source),
            )
            .build()
            .context("Failed to read hub configuration")?;

        let hub_config: HubConfig = config
            .try_deserialize()
            .context("Invalid hub configuration")?;
        hub_config.validate()?;
        Ok(hub_config)
    }

    fn validate(&self) -> Result<()> {
        self.zone()?;
        self.thresholds.to_thresholds()?;
        if self.live_capacity == 0 {
            bail!("HUB_LIVE_CAPACITY must be at least 1");
        }
        Ok(())
    }

    pub fn zone(&self) -> Result<LocalZone> {
        LocalZone::from_hours(self.utc_offset_hours)
            .with_context(|| format!("UTC offset out of range: {} hours", self.utc_offset_hours))
    }
}

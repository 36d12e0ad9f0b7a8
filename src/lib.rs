pub mod actors;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod clock;
pub mod config;
pub mod connector;
pub mod hub;
pub mod profile;
pub mod sensor;
pub mod storage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped sensor sample
///
/// Readings are immutable once stored. `soil_moisture` is a ratio in `[0, 1]`,
/// which the hardware frame validator and the stores both enforce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub co2_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_level: Option<f64>,
}

impl Reading {
    pub fn has_valid_moisture(&self) -> bool {
        (0.0..=1.0).contains(&self.soil_moisture)
    }
}

/// Inclusive `[min, max]` band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Optimal growing conditions for the species currently being monitored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesProfile {
    pub name: String,
    pub temperature: Range,
    pub humidity: Range,
    pub soil_moisture: Range,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2: Option<Range>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<Range>,
}

impl Default for SpeciesProfile {
    fn default() -> Self {
        Self {
            name: "Tomato".to_string(),
            temperature: Range::new(18.0, 27.0),
            humidity: Range::new(60.0, 80.0),
            soil_moisture: Range::new(0.4, 0.8),
            co2: None,
            light: None,
        }
    }
}

//! Hardware line protocol
//!
//! The microcontroller writes one JSON object per line. Exactly three shapes
//! are understood:
//!
//! ```text
//! {"type":"telemetry","temperature":N,"humidity":N,"soilMoisture":N,"co2Level":N,"lightLevel":N?}
//! {"type":"ack","command":S,"success":B,"message":S?}
//! {"type":"error","message":S,"code":S?}
//! ```
//!
//! Parsing is split in two steps: the line is first decoded into a generic
//! JSON value so that an unknown `type` tag can be reported as
//! [`FrameError::Unrecognized`] instead of a bare serde error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Reading;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty line")]
    Empty,

    #[error("line is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame has no type tag")]
    MissingTag,

    #[error("unrecognized frame type '{tag}'")]
    Unrecognized { tag: String },

    #[error("invalid telemetry: {0}")]
    Invalid(String),
}

/// One decoded line from the hardware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HardwareFrame {
    Telemetry(TelemetryFrame),
    Ack {
        command: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

/// Raw telemetry values as sent by the board
///
/// `co2_level` arrives as a JSON number and may be fractional or negative on
/// a misbehaving sensor, so it is only narrowed after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub co2_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_level: Option<f64>,
}

impl TelemetryFrame {
    /// Check the frame and turn it into a [`Reading`] stamped with `timestamp`
    pub fn into_reading(self, timestamp: DateTime<Utc>) -> Result<Reading, FrameError> {
        let finite = [self.temperature, self.humidity, self.soil_moisture, self.co2_level]
            .iter()
            .chain(self.light_level.iter())
            .all(|v| v.is_finite());

        if !finite {
            return Err(FrameError::Invalid("non-finite value".to_string()));
        }

        if !(0.0..=1.0).contains(&self.soil_moisture) {
            return Err(FrameError::Invalid(format!(
                "soil moisture {} outside [0, 1]",
                self.soil_moisture
            )));
        }

        if self.co2_level < 0.0 || self.co2_level > u32::MAX as f64 {
            return Err(FrameError::Invalid(format!(
                "co2 level {} out of range",
                self.co2_level
            )));
        }

        Ok(Reading {
            timestamp,
            temperature: self.temperature,
            humidity: self.humidity,
            soil_moisture: self.soil_moisture,
            co2_level: self.co2_level.round() as u32,
            light_level: self.light_level,
        })
    }
}

const KNOWN_TAGS: [&str; 3] = ["telemetry", "ack", "error"];

/// Decode a single protocol line
pub fn parse_line(line: &str) -> Result<HardwareFrame, FrameError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(FrameError::Empty);
    }

    let value: serde_json::Value = serde_json::from_str(line)?;

    let tag = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(FrameError::MissingTag)?;

    if !KNOWN_TAGS.contains(&tag) {
        return Err(FrameError::Unrecognized {
            tag: tag.to_string(),
        });
    }

    Ok(serde_json::from_value(value)?)
}

/// Outbound command for an actuator (pump, fan, lamp, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub command: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl ActuatorCommand {
    /// Serialize as one protocol line, newline included
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

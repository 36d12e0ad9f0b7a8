//! Sensor sources
//!
//! Both the serial-attached board ([`hardware::HardwareSource`]) and the
//! fallback generator ([`simulated::SimulatedSource`]) implement
//! [`SensorSource`], so the sensor actor never needs to know which one it
//! is driving.

pub mod frame;
pub mod hardware;
pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Reading;
use frame::ActuatorCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Hardware,
    Simulated,
}

/// Something a source observed
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Reading(Reading),
    Ack {
        command: String,
        success: bool,
        message: Option<String>,
    },
    Fault {
        message: String,
        code: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait SensorSource: Send {
    /// Wait for the next event
    ///
    /// `None` means the underlying transport is gone and the source will not
    /// produce anything again.
    async fn next_event(&mut self) -> Option<SourceEvent>;

    fn kind(&self) -> SourceKind;

    fn device(&self) -> Option<&str> {
        None
    }

    /// Forward an actuator command; `Ok(false)` if this source cannot
    async fn send_command(&mut self, _command: &ActuatorCommand) -> Result<bool, SensorError> {
        Ok(false)
    }
}

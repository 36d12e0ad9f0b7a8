//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to one actor via mpsc
//! 2. **Events**: Broadcast notifications published to any number of subscribers
//! 3. **Immutability**: Events are cloneable for multi-subscriber fan-out

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::Reading;
use crate::alerts::{Alert, AlertCategory};
use crate::hub::{Envelope, SubscriberSink};
use crate::sensor::frame::ActuatorCommand;
use crate::sensor::{SourceEvent, SourceKind};

/// Event published by the sensor actor
///
/// The broadcast channel may lag for slow subscribers. Readings are produced
/// continuously, so a skipped event is acceptable.
#[derive(Debug, Clone)]
pub enum SensorEvent {
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
    /// Source switched, connected or lost its transport
    Status(SensorStatus),
    /// An actuator command was accepted by the hardware link
    ActuatorUpdated(ActuatorCommand),
}

impl From<SourceEvent> for SensorEvent {
    fn from(event: SourceEvent) -> Self {
        match event {
            SourceEvent::Reading(reading) => SensorEvent::Reading(reading),
            SourceEvent::Ack {
                command,
                success,
                message,
            } => SensorEvent::Ack {
                command,
                success,
                message,
            },
            SourceEvent::Fault { message, code } => SensorEvent::Fault { message, code },
        }
    }
}

/// Snapshot of the sensor actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorStatus {
    pub connected: bool,
    /// `None` while idle after losing hardware without fallback
    pub source: Option<SourceKind>,
    pub device: Option<String>,
    pub readings_count: u64,
    pub last_reading: Option<DateTime<Utc>>,
}

/// Commands that can be sent to the SensorActor
#[derive(Debug)]
pub enum SensorCommand {
    /// Forward a command to the hardware actuators
    Actuate {
        command: ActuatorCommand,
        respond_to: oneshot::Sender<bool>,
    },

    GetStatus {
        respond_to: oneshot::Sender<SensorStatus>,
    },

    /// Gracefully shut down the sensor actor
    Shutdown,
}

/// Commands that can be sent to the AlertActor
#[derive(Debug)]
pub enum AlertCommand {
    /// Run an evaluation cycle right away
    EvaluateNow {
        respond_to: oneshot::Sender<Vec<Alert>>,
    },

    Recent {
        limit: usize,
        respond_to: oneshot::Sender<Vec<Alert>>,
    },

    ByCategory {
        category: AlertCategory,
        respond_to: oneshot::Sender<Vec<Alert>>,
    },

    /// Administrative clear of the history
    Clear {
        respond_to: oneshot::Sender<usize>,
    },

    /// Gracefully shut down the alert actor
    Shutdown,
}

/// Commands that can be sent to the HubActor
pub enum HubCommand {
    Register {
        sink: Arc<dyn SubscriberSink>,
        respond_to: oneshot::Sender<u64>,
    },

    Unregister {
        id: u64,
    },

    /// Text frame received from a subscriber
    Incoming {
        id: u64,
        text: String,
    },

    Broadcast {
        envelope: Envelope,
        respond_to: Option<oneshot::Sender<usize>>,
    },

    SubscriberCount {
        respond_to: oneshot::Sender<usize>,
    },

    /// Gracefully shut down the hub actor
    Shutdown,
}

impl std::fmt::Debug for HubCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubCommand::Register { .. } => f.write_str("Register"),
            HubCommand::Unregister { id } => write!(f, "Unregister({id})"),
            HubCommand::Incoming { id, .. } => write!(f, "Incoming({id})"),
            HubCommand::Broadcast { envelope, .. } => write!(f, "Broadcast({:?})", envelope.kind),
            HubCommand::SubscriberCount { .. } => f.write_str("SubscriberCount"),
            HubCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Commands that can be sent to the IngestActor
#[derive(Debug)]
pub enum IngestCommand {
    GetStats {
        respond_to: oneshot::Sender<IngestStats>,
    },

    /// Gracefully shut down the ingest actor
    Shutdown,
}

/// Ingestion statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    /// Readings written to the store
    pub persisted: u64,

    /// Readings the store rejected or failed to write
    pub persist_failures: u64,

    /// Events handed to the hub
    pub published: u64,

    /// Readings removed by retention cleanup
    pub total_deleted: u64,

    pub last_cleanup: Option<DateTime<Utc>>,
}

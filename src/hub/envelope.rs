use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every event type the hub emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ConnectionEstablished,
    Heartbeat,
    TelemetryUpdate,
    NewAlerts,
    ArduinoAck,
    ArduinoError,
    AiAnalysis,
    ActuatorUpdated,
    PlantChanged,
    ChatMessage,
    Pong,
    SubscriptionConfirmed,
    SensorStatus,
}

impl EventType {
    /// Topic a subscriber has to declare to receive this event when the hub
    /// filters by topic. `None` means the event is always delivered.
    pub fn topic(self) -> Option<Topic> {
        match self {
            EventType::TelemetryUpdate => Some(Topic::Telemetry),
            EventType::NewAlerts => Some(Topic::Alerts),
            EventType::AiAnalysis | EventType::ChatMessage => Some(Topic::Analysis),
            EventType::ArduinoAck
            | EventType::ArduinoError
            | EventType::ActuatorUpdated
            | EventType::SensorStatus => Some(Topic::Hardware),
            EventType::ConnectionEstablished
            | EventType::Heartbeat
            | EventType::PlantChanged
            | EventType::Pong
            | EventType::SubscriptionConfirmed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Telemetry,
    Alerts,
    Analysis,
    Hardware,
}

impl std::str::FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telemetry" => Ok(Topic::Telemetry),
            "alerts" => Ok(Topic::Alerts),
            "analysis" => Ok(Topic::Analysis),
            "hardware" => Ok(Topic::Hardware),
            other => Err(format!("unknown topic '{other}'")),
        }
    }
}

/// Wire envelope: `{"type": ..., "data": ..., "timestamp": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EventType,

    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Envelope {
    pub fn new(kind: EventType, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Fill in the timestamp unless the producer already set one
    pub fn stamped(mut self) -> Self {
        self.timestamp.get_or_insert_with(Utc::now);
        self
    }
}

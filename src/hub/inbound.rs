//! Messages accepted from subscribers

use serde_json::{Value, json};

use super::HubError;
use super::envelope::Topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    Ping,
    Subscribe(Topic),
    Unsubscribe(Topic),
}

impl ClientMessage {
    /// Wire form sent by a subscriber
    pub fn to_value(self) -> Value {
        match self {
            ClientMessage::Ping => json!({ "type": "ping" }),
            ClientMessage::Subscribe(topic) => {
                json!({ "type": "subscribe", "data": { "topic": topic } })
            }
            ClientMessage::Unsubscribe(topic) => {
                json!({ "type": "unsubscribe", "data": { "topic": topic } })
            }
        }
    }
}

/// Result of decoding a subscriber frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Known(ClientMessage),
    Unrecognized { kind: String },
}

impl Inbound {
    /// Decode a text frame
    ///
    /// A subscription topic may be given as `data.topic` or as a top-level
    /// `subscription` field.
    pub fn parse(text: &str) -> Result<Self, HubError> {
        let value: Value = serde_json::from_str(text)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(HubError::MissingType)?;

        let message = match kind {
            "ping" => ClientMessage::Ping,
            "subscribe" => ClientMessage::Subscribe(topic_of(&value)?),
            "unsubscribe" => ClientMessage::Unsubscribe(topic_of(&value)?),
            other => {
                return Ok(Inbound::Unrecognized {
                    kind: other.to_string(),
                });
            }
        };

        Ok(Inbound::Known(message))
    }
}

fn topic_of(value: &Value) -> Result<Topic, HubError> {
    let raw = value
        .pointer("/data/topic")
        .or_else(|| value.get("subscription"))
        .and_then(Value::as_str)
        .ok_or(HubError::MissingTopic)?;

    raw.parse().map_err(HubError::UnknownTopic)
}

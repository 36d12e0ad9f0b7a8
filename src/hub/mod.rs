//! Broadcast hub protocol
//!
//! Wire types shared by the hub actor ([`crate::actors::hub`]) and the client
//! connector ([`crate::connector`]), plus the [`SubscriberSink`] seam through
//! which the hub writes to a connection without knowing its transport.

pub mod envelope;
pub mod inbound;

use thiserror::Error;
use tokio::sync::mpsc;

pub use envelope::{Envelope, EventType, Topic};
pub use inbound::{ClientMessage, Inbound};

#[derive(Debug, Error)]
pub enum HubError {
    #[error("subscriber connection is closed")]
    Closed,

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message has no type")]
    MissingType,

    #[error("subscription without topic")]
    MissingTopic,

    #[error("{0}")]
    UnknownTopic(String),

    #[error("hub is not running")]
    Stopped,
}

/// Write side of one subscriber connection
///
/// Sends never block: the hub does not apply backpressure, a slow connection
/// only grows its own outgoing queue.
pub trait SubscriberSink: Send + Sync {
    fn send_text(&self, text: &str) -> Result<(), HubError>;

    fn is_open(&self) -> bool;
}

impl SubscriberSink for mpsc::UnboundedSender<String> {
    fn send_text(&self, text: &str) -> Result<(), HubError> {
        self.send(text.to_string()).map_err(|_| HubError::Closed)
    }

    fn is_open(&self) -> bool {
        !self.is_closed()
    }
}

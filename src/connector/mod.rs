//! Subscriber side of the broadcast hub
//!
//! [`machine`] holds the reconnection rules as a pure state machine;
//! [`client`] drives it over a WebSocket (feature `client`).

#[cfg(feature = "client")]
pub mod client;
pub mod machine;

#[cfg(feature = "client")]
pub use client::{ConnectorBuilder, ConnectorHandle};
pub use machine::{
    Action, ConnectionMachine, ConnectionState, NORMAL_CLOSURE, ReconnectPolicy, TransportEvent,
};

//! Actor-based telemetry pipeline
//!
//! Each actor runs as an independent async task communicating via Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!        ┌────────────────┐
//!        │  SensorActor   │ hardware line protocol or simulation
//!        └───────┬────────┘
//!                │ SensorEvent
//!      ┌─────────▼──────────┐
//!      │ Broadcast Channel  │
//!      └─────────┬──────────┘
//!                │ subscribe
//!        ┌───────▼────────┐      ┌──────────────┐
//!        │  IngestActor   ├─────►│ TelemetryStore│
//!        └───────┬────────┘      └──────┬───────┘
//!                │ publish              │ latest N
//!        ┌───────▼────────┐      ┌──────▼───────┐
//!        │   HubActor     │◄─────┤  AlertActor  │
//!        └───────┬────────┘      └──────────────┘
//!                │ envelopes
//!         WebSocket subscribers
//! ```
//!
//! ## Actor Types
//!
//! - **SensorActor**: Owns the active sensor source, forwards actuator commands
//! - **IngestActor**: Persists readings, forwards sensor events, prunes old rows
//! - **AlertActor**: Runs the alert engine on a timer and publishes results
//! - **HubActor**: Tracks subscribers and fans envelopes out to them
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has an mpsc command channel for control messages
//! 2. **Events**: The sensor actor publishes to a broadcast channel for fan-out
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod alert;
pub mod hub;
pub mod ingest;
pub mod messages;
pub mod sensor;

//! API shared state containing actor handles

use std::sync::Arc;

use crate::actors::{
    alert::AlertHandle, hub::HubHandle, ingest::IngestHandle, sensor::SensorHandle,
};
use crate::profile::SharedProfile;
use crate::storage::TelemetryStore;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Store for telemetry queries
    pub store: Arc<dyn TelemetryStore>,

    /// Broadcast hub, also the target of WebSocket connections
    pub hub: HubHandle,

    /// Handle to the sensor actor for status and actuator commands
    pub sensor: SensorHandle,

    /// Handle to the alert actor for history and on-demand evaluation
    pub alerts: AlertHandle,

    /// Handle to the ingestion pipeline for statistics
    pub ingest: IngestHandle,

    /// Active species profile
    pub profile: Arc<SharedProfile>,
}

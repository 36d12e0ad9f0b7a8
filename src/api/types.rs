//! API response types

use serde::{Deserialize, Serialize};

use crate::Reading;
use crate::actors::messages::{IngestStats, SensorStatus};
use crate::alerts::Alert;
use crate::sensor::SourceKind;
use crate::sensor::frame::ActuatorCommand;

/// Response for GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Source currently feeding the pipeline
    pub source: Option<SourceKind>,
    pub subscribers: usize,
    pub timestamp: String,
}

/// Response for GET /api/v1/stats
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub timestamp: String,
    pub subscribers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor: Option<SensorStatus>,
    pub stored_readings: usize,
    pub alerts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestStats>,
}

/// Response for the telemetry endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryResponse {
    pub count: usize,
    pub readings: Vec<Reading>,
}

/// Response for the alert listing endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub count: usize,
    pub alerts: Vec<Alert>,
}

/// Response for DELETE /api/v1/alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

/// Response for POST /api/v1/actuators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorResponse {
    pub accepted: bool,
    pub command: ActuatorCommand,
}

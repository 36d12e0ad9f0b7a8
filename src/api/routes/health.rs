//! Liveness endpoint

use axum::{Json, extract::State};

use crate::api::{state::ApiState, types::HealthResponse};

/// GET /api/v1/health
///
/// `degraded` when the sensor actor no longer answers or has no source left
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let source = state.sensor.status().await.ok().and_then(|status| status.source);
    let subscribers = state.hub.subscriber_count().await.unwrap_or_default();

    Json(HealthResponse {
        status: if source.is_some() { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        source,
        subscribers,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

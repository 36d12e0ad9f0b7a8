//! System statistics endpoint

use axum::{Json, extract::State};
use tracing::debug;

use crate::alerts::HISTORY_CAPACITY;
use crate::api::{error::ApiResult, state::ApiState, types::StatsResponse};

/// GET /api/v1/stats
///
/// Returns subscriber count, sensor status, stored readings and alert count
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<StatsResponse>> {
    let subscribers = state.hub.subscriber_count().await?;
    let stored_readings = state.store.count().await?;

    // actors that are shutting down just leave their section out
    let sensor = state
        .sensor
        .status()
        .await
        .inspect_err(|e| debug!("sensor status unavailable: {e:#}"))
        .ok();
    let ingest = state.ingest.stats().await.ok();
    let alerts = state
        .alerts
        .recent(HISTORY_CAPACITY)
        .await
        .map(|alerts| alerts.len())
        .unwrap_or_default();

    Ok(Json(StatsResponse {
        timestamp: chrono::Utc::now().to_rfc3339(),
        subscribers,
        sensor,
        stored_readings,
        alerts,
        ingest,
    }))
}

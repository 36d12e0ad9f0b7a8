//! Telemetry query endpoints

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::TelemetryResponse,
};

/// Upper bound for `limit`
const MAX_LIMIT: usize = 1000;

/// Upper bound for `hours`: one year
const MAX_HOURS: i64 = 24 * 365;

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    /// Number of readings (default: 20)
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Look-back window in hours (default: 24)
    hours: Option<i64>,
}

/// GET /api/v1/telemetry/latest?limit=N
///
/// Most recent readings, newest first
pub async fn get_latest(
    State(state): State<ApiState>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Json<TelemetryResponse>> {
    let limit = query.limit.unwrap_or(20).min(MAX_LIMIT);
    let readings = state.store.latest(limit).await?;

    Ok(Json(TelemetryResponse {
        count: readings.len(),
        readings,
    }))
}

/// GET /api/v1/telemetry/history?hours=H
///
/// Readings of the last `hours` hours, newest first
pub async fn get_history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<TelemetryResponse>> {
    let hours = query.hours.unwrap_or(24);
    if !(1..=MAX_HOURS).contains(&hours) {
        return Err(ApiError::InvalidRequest(format!(
            "hours must be between 1 and {MAX_HOURS}"
        )));
    }

    let readings = state.store.since(Utc::now() - Duration::hours(hours)).await?;

    Ok(Json(TelemetryResponse {
        count: readings.len(),
        readings,
    }))
}

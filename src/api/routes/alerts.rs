//! Alert history endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::info;

use crate::alerts::{AlertCategory, HISTORY_CAPACITY};
use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{AlertsResponse, ClearResponse},
};

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Max alerts (default: the whole history)
    limit: Option<usize>,
}

/// GET /api/v1/alerts?limit=K
///
/// Most recent alerts, newest first
pub async fn list_alerts(
    State(state): State<ApiState>,
    Query(query): Query<AlertQuery>,
) -> ApiResult<Json<AlertsResponse>> {
    let limit = query.limit.unwrap_or(HISTORY_CAPACITY);
    let alerts = state.alerts.recent(limit).await?;

    Ok(Json(AlertsResponse {
        count: alerts.len(),
        alerts,
    }))
}

/// GET /api/v1/alerts/category/{category}
pub async fn alerts_by_category(
    State(state): State<ApiState>,
    Path(category): Path<String>,
) -> ApiResult<Json<AlertsResponse>> {
    let category: AlertCategory = category.parse().map_err(ApiError::InvalidRequest)?;
    let alerts = state.alerts.by_category(category).await?;

    Ok(Json(AlertsResponse {
        count: alerts.len(),
        alerts,
    }))
}

/// DELETE /api/v1/alerts
///
/// Administrative clear of the alert history
pub async fn clear_alerts(State(state): State<ApiState>) -> ApiResult<Json<ClearResponse>> {
    let cleared = state.alerts.clear().await?;
    info!("alert history cleared via API ({cleared} alerts)");

    Ok(Json(ClearResponse { cleared }))
}

/// POST /api/v1/alerts/evaluate
///
/// Run an evaluation cycle now and return the alerts it produced
pub async fn evaluate_now(State(state): State<ApiState>) -> ApiResult<Json<AlertsResponse>> {
    let alerts = state.alerts.evaluate_now().await?;

    Ok(Json(AlertsResponse {
        count: alerts.len(),
        alerts,
    }))
}

//! Active species profile endpoints

use axum::{Json, extract::State};
use serde_json::json;
use tracing::warn;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};
use crate::hub::EventType;
use crate::profile::SpeciesProfileLookup;
use crate::{Range, SpeciesProfile};

/// GET /api/v1/profile
pub async fn get_profile(State(state): State<ApiState>) -> Json<SpeciesProfile> {
    Json(state.profile.current().await)
}

/// PUT /api/v1/profile
///
/// Replace the active profile and announce it as `plant_changed`
pub async fn put_profile(
    State(state): State<ApiState>,
    Json(profile): Json<SpeciesProfile>,
) -> ApiResult<Json<SpeciesProfile>> {
    validate(&profile)?;

    let previous = state.profile.replace(profile.clone()).await;

    let data = json!({ "previous": previous.name, "profile": profile });
    if let Err(e) = state.hub.publish(EventType::PlantChanged, data).await {
        warn!("failed to announce profile change: {e:#}");
    }

    Ok(Json(profile))
}

fn validate(profile: &SpeciesProfile) -> ApiResult<()> {
    if profile.name.trim().is_empty() {
        return Err(ApiError::InvalidRequest("profile name is empty".to_string()));
    }

    let ranges = [
        ("temperature", Some(profile.temperature)),
        ("humidity", Some(profile.humidity)),
        ("soilMoisture", Some(profile.soil_moisture)),
        ("co2", profile.co2),
        ("light", profile.light),
    ];

    for (name, range) in ranges {
        if let Some(Range { min, max }) = range
            && !(min.is_finite() && max.is_finite() && min <= max)
        {
            return Err(ApiError::InvalidRequest(format!(
                "{name} range [{min}, {max}] is invalid"
            )));
        }
    }

    Ok(())
}

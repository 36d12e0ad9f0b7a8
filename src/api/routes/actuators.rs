//! Actuator control endpoint

use axum::{Json, extract::State, http::StatusCode};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::ActuatorResponse,
};
use crate::sensor::frame::ActuatorCommand;

/// POST /api/v1/actuators
///
/// Forward a command such as `{"command": "pump", "value": true}` to the
/// hardware. Answers 503 when no hardware link accepted it.
pub async fn send_command(
    State(state): State<ApiState>,
    Json(command): Json<ActuatorCommand>,
) -> ApiResult<(StatusCode, Json<ActuatorResponse>)> {
    if command.command.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "command must not be empty".to_string(),
        ));
    }

    let accepted = state.sensor.send_command(command.clone()).await?;
    if !accepted {
        return Err(ApiError::Unavailable(format!(
            "no hardware link accepted '{}'",
            command.command
        )));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(ActuatorResponse { accepted, command }),
    ))
}

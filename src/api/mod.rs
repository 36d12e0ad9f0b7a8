//! REST API and WebSocket server for the greenhouse hub
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/stats` - Subscribers, sensor status, stored readings, alerts
//! - `GET /api/v1/telemetry/latest` - Most recent readings
//! - `GET /api/v1/telemetry/history` - Readings of the last hours
//! - `GET /api/v1/alerts` - Alert history
//! - `GET /api/v1/alerts/category/{category}` - Alerts of one category
//! - `DELETE /api/v1/alerts` - Clear the alert history
//! - `POST /api/v1/alerts/evaluate` - Run an evaluation cycle now
//! - `POST /api/v1/actuators` - Forward an actuator command
//! - `GET|PUT /api/v1/profile` - Active species profile
//! - `WS /api/v1/stream` - Broadcast hub subscription

pub mod error;
pub mod routes;
pub mod state;
pub mod types;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::HubConfig;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Enable CORS for dashboards served from elsewhere
    pub enable_cors: bool,
}

impl From<&HubConfig> for ApiConfig {
    fn from(config: &HubConfig) -> Self {
        Self {
            bind_addr: config.bind_addr,
            enable_cors: config.enable_cors,
        }
    }
}

/// Build the router with all routes
pub fn router(state: ApiState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route(
            "/api/v1/telemetry/latest",
            get(routes::telemetry::get_latest),
        )
        .route(
            "/api/v1/telemetry/history",
            get(routes::telemetry::get_history),
        )
        .route(
            "/api/v1/alerts",
            get(routes::alerts::list_alerts).delete(routes::alerts::clear_alerts),
        )
        .route(
            "/api/v1/alerts/category/:category",
            get(routes::alerts::alerts_by_category),
        )
        .route(
            "/api/v1/alerts/evaluate",
            post(routes::alerts::evaluate_now),
        )
        .route("/api/v1/actuators", post(routes::actuators::send_command))
        .route(
            "/api/v1/profile",
            get(routes::profile::get_profile).put(routes::profile::put_profile),
        )
        .route("/api/v1/stream", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, config.enable_cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}

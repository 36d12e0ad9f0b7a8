//! HTTP collaborators against mock upstreams

use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{NaiveDate, Utc};
use greenhouse_telemetry::SpeciesProfile;
use greenhouse_telemetry::alerts::advisor::{ChatCompletionsAdvisor, PredictiveAdvisor};
use greenhouse_telemetry::alerts::engine::predict;
use greenhouse_telemetry::alerts::weather::{OpenWeatherClient, WeatherAdvisory};
use greenhouse_telemetry::alerts::{AdvisoryError, AlertKind};
use greenhouse_telemetry::config::{AdvisorConfig, WeatherConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

// 2025-01-01T12:00:00Z
const NOON: i64 = 1_735_732_800;
const HOUR: i64 = 3600;

fn weather_config(server: &MockServer) -> WeatherConfig {
    WeatherConfig {
        base_url: server.uri(),
        api_key: Some("test-key".to_string()),
        latitude: 52.52,
        longitude: 13.40,
    }
}

fn advisor_config(server: &MockServer) -> AdvisorConfig {
    AdvisorConfig {
        base_url: format!("{}/v1", server.uri()),
        api_key: Some("sk-test".to_string()),
        model: "gpt-4o-mini".to_string(),
        max_tokens: 300,
    }
}

fn current_weather_body() -> serde_json::Value {
    json!({
        "dt": NOON,
        "main": { "temp": 3.5, "humidity": 88 },
        "weather": [{ "description": "light snow" }]
    })
}

fn completion(content: &str) -> serde_json::Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

#[tokio::test]
async fn test_weather_snapshot_with_daily_forecast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("appid", "test-key"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [
                { "dt": NOON + 3 * HOUR, "main": { "temp_min": 1.0, "temp_max": 4.0 } },
                { "dt": NOON + 15 * HOUR, "main": { "temp_min": -2.0, "temp_max": 0.5 } },
                { "dt": NOON + 24 * HOUR, "main": { "temp_min": 0.0, "temp_max": 6.0 } }
            ]
        })))
        .mount(&server)
        .await;

    let client = OpenWeatherClient::new(&weather_config(&server)).unwrap();
    let snapshot = client.current().await.unwrap();

    assert_eq!(snapshot.temperature, 3.5);
    assert_eq!(snapshot.humidity, 88.0);
    assert_eq!(snapshot.description, "light snow");
    assert_eq!(snapshot.forecast.len(), 1);
    assert_eq!(
        snapshot.forecast[0].date,
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
    );
    assert_eq!(snapshot.forecast[0].min, -2.0);
    assert_eq!(snapshot.forecast[0].max, 6.0);
}

#[tokio::test]
async fn test_weather_survives_forecast_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = OpenWeatherClient::new(&weather_config(&server)).unwrap();
    let snapshot = client.current().await.unwrap();

    assert!(snapshot.forecast.is_empty());
}

#[tokio::test]
async fn test_weather_rejected_key_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "cod": 401 })))
        .mount(&server)
        .await;

    let client = OpenWeatherClient::new(&weather_config(&server)).unwrap();

    assert_matches!(client.current().await, Err(AdvisoryError::Status(401)));
}

#[tokio::test]
async fn test_advisor_sends_context_and_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 300,
            "messages": [
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": "how warm tomorrow?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Mild, around 22°C.")))
        .expect(1)
        .mount(&server)
        .await;

    let advisor = ChatCompletionsAdvisor::new(&advisor_config(&server)).unwrap();
    let answer = advisor.ask("how warm tomorrow?", "be brief").await.unwrap();

    assert_eq!(answer, "Mild, around 22°C.");
}

#[tokio::test]
async fn test_advisor_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let advisor = ChatCompletionsAdvisor::new(&advisor_config(&server)).unwrap();

    assert_matches!(
        advisor.ask("prompt", "context").await,
        Err(AdvisoryError::Status(429))
    );
}

#[tokio::test]
async fn test_prediction_from_http_advisor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "Temperatures keep climbing; open the vents before noon to stay below 27°C.",
        )))
        .mount(&server)
        .await;

    let advisor = ChatCompletionsAdvisor::new(&advisor_config(&server)).unwrap();
    let readings = temperature_series(&[25.0, 24.6, 24.1, 23.7, 23.2, 22.8]);

    let alert = predict(
        &advisor,
        &SpeciesProfile::default(),
        &readings,
        Duration::from_secs(5),
        Utc::now(),
    )
    .await
    .unwrap();

    assert_eq!(alert.kind, AlertKind::Prediction);
    assert!(!alert.action_required);
    assert!(alert.message.contains("open the vents"));
}

#[tokio::test]
async fn test_slow_advisor_is_abandoned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("This answer arrives far too late to matter."))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let advisor = ChatCompletionsAdvisor::new(&advisor_config(&server)).unwrap();
    let readings = temperature_series(&[22.0; 6]);

    let alert = predict(
        &advisor,
        &SpeciesProfile::default(),
        &readings,
        Duration::from_millis(200),
        Utc::now(),
    )
    .await;

    assert!(alert.is_none());
}

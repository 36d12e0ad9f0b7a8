//! Helper functions for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use greenhouse_telemetry::Reading;
use greenhouse_telemetry::actors::hub::HubHandle;
use greenhouse_telemetry::hub::SubscriberSink;
use serde_json::Value;
use tokio::sync::mpsc;

pub fn reading_at(timestamp: DateTime<Utc>, temperature: f64, soil_moisture: f64) -> Reading {
    Reading {
        timestamp,
        temperature,
        humidity: 70.0,
        soil_moisture,
        co2_level: 650,
        light_level: None,
    }
}

pub fn reading(temperature: f64) -> Reading {
    reading_at(Utc::now(), temperature, 0.6)
}

/// Readings one minute apart, newest first, with the given temperatures
pub fn temperature_series(temperatures: &[f64]) -> Vec<Reading> {
    let now = Utc::now();
    temperatures
        .iter()
        .enumerate()
        .map(|(i, &t)| reading_at(now - chrono::Duration::minutes(i as i64), t, 0.6))
        .collect()
}

pub fn telemetry_line(temperature: f64, soil_moisture: f64) -> String {
    format!(
        "{{\"type\":\"telemetry\",\"temperature\":{temperature},\"humidity\":65,\"soilMoisture\":{soil_moisture},\"co2Level\":700}}\n"
    )
}

/// Register an in-process subscriber and swallow its welcome message
pub async fn subscribe(hub: &HubHandle) -> (u64, mpsc::UnboundedReceiver<String>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let sink: Arc<dyn SubscriberSink> = Arc::new(tx);
    let id = hub.connect(sink).await.unwrap();

    let welcome = next_envelope(&mut rx).await;
    assert_eq!(welcome["type"], "connection_established");

    (id, rx)
}

pub async fn next_envelope(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
    let text = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for envelope")
        .expect("subscriber channel closed");
    serde_json::from_str(&text).unwrap()
}

/// Next envelope of the given type, skipping others
pub async fn next_of_type(rx: &mut mpsc::UnboundedReceiver<String>, kind: &str) -> Value {
    loop {
        let envelope = next_envelope(rx).await;
        if envelope["type"] == kind {
            return envelope;
        }
    }
}

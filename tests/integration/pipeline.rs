//! Sensor → ingest → store/hub → alerts, wired the way the hub binary does it

use std::sync::Arc;
use std::time::Duration;

use greenhouse_telemetry::actors::alert::{AlertDeps, AlertHandle, AlertSettings};
use greenhouse_telemetry::actors::hub::{HubHandle, HubSettings};
use greenhouse_telemetry::actors::ingest::IngestHandle;
use greenhouse_telemetry::actors::sensor::SensorHandle;
use greenhouse_telemetry::alerts::AlertEngine;
use greenhouse_telemetry::clock::SystemClock;
use greenhouse_telemetry::profile::SharedProfile;
use greenhouse_telemetry::sensor::hardware::HardwareSource;
use greenhouse_telemetry::storage::{MemoryStore, TelemetryStore};
use pretty_assertions::assert_eq;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::helpers::*;

#[tokio::test]
async fn test_hardware_reading_reaches_store_and_subscribers() {
    let store = Arc::new(MemoryStore::new());
    let hub = HubHandle::spawn(HubSettings::default());
    let (_id, mut rx) = subscribe(&hub).await;

    let (sensor_tx, sensor_rx) = broadcast::channel(64);
    let ingest = IngestHandle::spawn(store.clone(), hub.clone(), sensor_rx, None);

    let (mut board, serial) = tokio::io::duplex(4096);
    let source = HardwareSource::new("/dev/ttyACM0", serial, None);
    let sensor = SensorHandle::spawn(Box::new(source), None, sensor_tx);

    let status = next_of_type(&mut rx, "sensor_status").await;
    assert_eq!(status["data"]["connected"], true);
    assert_eq!(status["data"]["device"], "/dev/ttyACM0");

    board.write_all(telemetry_line(23.5, 0.55).as_bytes()).await.unwrap();
    board.write_all(b"{not json\n").await.unwrap();
    // moisture outside [0, 1] never reaches the store
    board.write_all(telemetry_line(24.0, 1.4).as_bytes()).await.unwrap();
    board.write_all(telemetry_line(24.5, 0.6).as_bytes()).await.unwrap();

    let first = next_of_type(&mut rx, "telemetry_update").await;
    assert_eq!(first["data"]["temperature"], 23.5);
    let second = next_of_type(&mut rx, "telemetry_update").await;
    assert_eq!(second["data"]["temperature"], 24.5);

    assert_eq!(store.count().await.unwrap(), 2);
    assert_eq!(store.latest(1).await.unwrap()[0].temperature, 24.5);
    assert_eq!(ingest.stats().await.unwrap().persisted, 2);
    assert_eq!(sensor.status().await.unwrap().readings_count, 2);

    sensor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_hardware_ack_and_error_are_forwarded() {
    let store = Arc::new(MemoryStore::new());
    let hub = HubHandle::spawn(HubSettings::default());
    let (_id, mut rx) = subscribe(&hub).await;

    let (sensor_tx, sensor_rx) = broadcast::channel(64);
    let _ingest = IngestHandle::spawn(store.clone(), hub.clone(), sensor_rx, None);

    let (mut board, serial) = tokio::io::duplex(4096);
    let _sensor = SensorHandle::spawn(
        Box::new(HardwareSource::new("/dev/ttyACM0", serial, None)),
        None,
        sensor_tx,
    );

    board
        .write_all(b"{\"type\":\"ack\",\"command\":\"fan\",\"success\":true}\n")
        .await
        .unwrap();
    board
        .write_all(b"{\"type\":\"error\",\"message\":\"DHT22 timeout\",\"code\":\"E2\"}\n")
        .await
        .unwrap();

    let ack = next_of_type(&mut rx, "arduino_ack").await;
    assert_eq!(ack["data"]["command"], "fan");
    assert_eq!(ack["data"]["success"], true);

    let error = next_of_type(&mut rx, "arduino_error").await;
    assert_eq!(error["data"]["message"], "DHT22 timeout");

    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_disconnect_falls_back_to_simulation() {
    let store = Arc::new(MemoryStore::new());
    let hub = HubHandle::spawn(HubSettings::default());
    let (_id, mut rx) = subscribe(&hub).await;

    let (sensor_tx, sensor_rx) = broadcast::channel(64);
    let _ingest = IngestHandle::spawn(store.clone(), hub.clone(), sensor_rx, None);

    let (board, serial) = tokio::io::duplex(4096);
    let _sensor = SensorHandle::spawn(
        Box::new(HardwareSource::new("/dev/ttyACM0", serial, None)),
        Some(Duration::from_millis(20)),
        sensor_tx,
    );
    next_of_type(&mut rx, "sensor_status").await;

    drop(board);

    let lost = next_of_type(&mut rx, "sensor_status").await;
    assert_eq!(lost["data"]["connected"], false);
    let simulated = next_of_type(&mut rx, "sensor_status").await;
    assert_eq!(simulated["data"]["source"], "simulated");

    let update = next_of_type(&mut rx, "telemetry_update").await;
    let moisture = update["data"]["soilMoisture"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&moisture));
    assert!(store.count().await.unwrap() >= 1);
}

#[tokio::test]
async fn test_stored_readings_drive_alert_evaluation() {
    let store = Arc::new(MemoryStore::new());
    let hub = HubHandle::spawn(HubSettings::default());
    let (_id, mut rx) = subscribe(&hub).await;

    let (sensor_tx, sensor_rx) = broadcast::channel(64);
    let _ingest = IngestHandle::spawn(store.clone(), hub.clone(), sensor_rx, None);

    let (mut board, serial) = tokio::io::duplex(4096);
    let _sensor = SensorHandle::spawn(
        Box::new(HardwareSource::new("/dev/ttyACM0", serial, None)),
        None,
        sensor_tx,
    );

    board.write_all(telemetry_line(10.0, 0.6).as_bytes()).await.unwrap();
    next_of_type(&mut rx, "telemetry_update").await;

    let alerts = AlertHandle::spawn(
        AlertEngine::new(Arc::new(SystemClock)),
        AlertDeps {
            store: store.clone(),
            profile: Arc::new(SharedProfile::default()),
            hub: hub.clone(),
            advisor: None,
        },
        AlertSettings {
            interval: Duration::from_secs(3600),
            ..AlertSettings::default()
        },
    );

    let produced = alerts.evaluate_now().await.unwrap();
    assert_eq!(produced.len(), 1);

    let envelope = next_of_type(&mut rx, "new_alerts").await;
    assert_eq!(envelope["data"][0]["type"], "critical");
    assert_eq!(envelope["data"][0]["category"], "temperature");
    assert_eq!(envelope["data"][0]["actionRequired"], true);
}

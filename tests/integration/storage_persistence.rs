//! SQLite persistence through the configured store

use std::sync::Arc;

use chrono::{Duration, Utc};
use greenhouse_telemetry::actors::hub::{HubHandle, HubSettings};
use greenhouse_telemetry::actors::ingest::IngestHandle;
use greenhouse_telemetry::actors::messages::SensorEvent;
use greenhouse_telemetry::config::StorageConfig;
use greenhouse_telemetry::storage::{self, MemoryStore, TelemetryStore};
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;

use crate::helpers::*;

fn sqlite_config(dir: &tempfile::TempDir) -> StorageConfig {
    StorageConfig::Sqlite {
        path: dir.path().join("telemetry.db"),
        retention_days: 30,
    }
}

#[tokio::test]
async fn test_readings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();

    {
        let store = storage::open(&sqlite_config(&dir)).await.unwrap();
        for i in 0..5 {
            store
                .insert(reading_at(now - Duration::minutes(i), 20.0 + i as f64, 0.5))
                .await
                .unwrap();
        }
    }

    let store = storage::open(&sqlite_config(&dir)).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 5);

    let latest = store.latest(2).await.unwrap();
    assert_eq!(latest[0].temperature, 20.0);
    assert_eq!(latest[1].temperature, 21.0);
}

#[tokio::test]
async fn test_sqlite_and_memory_agree_on_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = storage::open(&sqlite_config(&dir)).await.unwrap();
    let memory: Arc<dyn TelemetryStore> = Arc::new(MemoryStore::new());
    let now = Utc::now();

    // inserted out of timestamp order on purpose
    for minutes in [3, 0, 4, 1, 2] {
        let reading = reading_at(now - Duration::minutes(minutes), 20.0 + minutes as f64, 0.5);
        sqlite.insert(reading.clone()).await.unwrap();
        memory.insert(reading).await.unwrap();
    }

    let from_sqlite: Vec<f64> = sqlite
        .latest(5)
        .await
        .unwrap()
        .iter()
        .map(|r| r.temperature)
        .collect();
    let from_memory: Vec<f64> = memory
        .latest(5)
        .await
        .unwrap()
        .iter()
        .map(|r| r.temperature)
        .collect();

    assert_eq!(from_sqlite, vec![20.0, 21.0, 22.0, 23.0, 24.0]);
    assert_eq!(from_sqlite, from_memory);

    let recent = sqlite.since(now - Duration::seconds(90)).await.unwrap();
    assert_eq!(recent.len(), 2);
}

#[tokio::test]
async fn test_ingest_persists_to_sqlite_and_prunes() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);
    let store = storage::open(&config).await.unwrap();
    store
        .insert(reading_at(Utc::now() - Duration::days(60), 18.0, 0.5))
        .await
        .unwrap();

    let hub = HubHandle::spawn(HubSettings::default());
    let (_id, mut rx) = subscribe(&hub).await;
    let (sensor_tx, sensor_rx) = broadcast::channel(16);
    let ingest = IngestHandle::spawn(store.clone(), hub, sensor_rx, config.retention_days());

    sensor_tx.send(SensorEvent::Reading(reading(22.0))).unwrap();
    next_of_type(&mut rx, "telemetry_update").await;

    let mut stats = ingest.stats().await.unwrap();
    for _ in 0..50 {
        if stats.last_cleanup.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        stats = ingest.stats().await.unwrap();
    }

    assert_eq!(stats.total_deleted, 1);
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(store.latest(1).await.unwrap()[0].temperature, 22.0);
}

//! Alert engine behaviour over whole evaluation cycles

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use greenhouse_telemetry::SpeciesProfile;
use greenhouse_telemetry::alerts::weather::{WeatherAdvisory, WeatherSnapshot};
use greenhouse_telemetry::alerts::{
    AdvisoryError, AlertCategory, AlertEngine, AlertKind, HISTORY_CAPACITY,
};
use greenhouse_telemetry::clock::{ManualClock, SystemClock};
use pretty_assertions::assert_eq;

use crate::helpers::*;

struct ColdSnap {
    calls: AtomicUsize,
}

#[async_trait]
impl WeatherAdvisory for ColdSnap {
    async fn current(&self) -> Result<WeatherSnapshot, AdvisoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(WeatherSnapshot {
            temperature: 2.0,
            humidity: 60.0,
            description: "clear sky".to_string(),
            forecast: Vec::new(),
        })
    }
}

fn engine() -> AlertEngine {
    AlertEngine::new(Arc::new(SystemClock))
}

#[tokio::test]
async fn test_threshold_severity_by_distance_from_range() {
    let profile = SpeciesProfile::default();

    let critical = engine().evaluate(&profile, &[reading(10.0)]).await;
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].kind, AlertKind::Critical);
    assert_eq!(critical[0].category, AlertCategory::Temperature);

    let warning = engine().evaluate(&profile, &[reading(16.0)]).await;
    assert_eq!(warning.len(), 1);
    assert_eq!(warning[0].kind, AlertKind::Warning);

    assert!(engine().evaluate(&profile, &[reading(22.0)]).await.is_empty());
}

#[tokio::test]
async fn test_fast_rising_temperature_yields_one_trend_alert() {
    let profile = SpeciesProfile::default();
    let readings = temperature_series(&[24.9, 23.6, 22.5, 21.2, 20.0]);

    let alerts = engine().evaluate(&profile, &readings).await;

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].category, AlertCategory::Temperature);
    assert!(alerts[0].title.contains("Rising"));
}

#[tokio::test]
async fn test_history_is_capped_newest_first() {
    let profile = SpeciesProfile::default();
    let mut engine = engine();

    let mut last = Vec::new();
    for _ in 0..60 {
        let cold_and_dry = reading_at(Utc::now(), 10.0, 0.1);
        last = engine.evaluate(&profile, &[cold_and_dry]).await;
        assert_eq!(last.len(), 2);
    }

    assert_eq!(engine.history_len(), HISTORY_CAPACITY);
    let recent = engine.recent(2);
    assert_eq!(recent[0].id, last[0].id);
    assert_eq!(recent[1].id, last[1].id);
}

#[tokio::test]
async fn test_weather_pass_is_rate_limited() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 15, 6, 0, 0).unwrap());
    let weather = Arc::new(ColdSnap {
        calls: AtomicUsize::new(0),
    });
    let mut engine = AlertEngine::new(Arc::new(clock.clone()))
        .with_weather(weather.clone(), Duration::from_secs(30 * 60));
    let profile = SpeciesProfile::default();

    let first = engine.evaluate(&profile, &[reading(22.0)]).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].title, "Cold Weather Outside");

    clock.advance(chrono::Duration::minutes(10));
    assert!(engine.evaluate(&profile, &[reading(22.0)]).await.is_empty());
    assert_eq!(weather.calls.load(Ordering::SeqCst), 1);

    clock.advance(chrono::Duration::minutes(25));
    assert_eq!(engine.evaluate(&profile, &[reading(22.0)]).await.len(), 1);
    assert_eq!(weather.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_pass_order_is_threshold_trend_weather() {
    let weather = Arc::new(ColdSnap {
        calls: AtomicUsize::new(0),
    });
    let mut engine = engine().with_weather(weather, Duration::from_secs(60));
    let profile = SpeciesProfile::default();
    let readings = temperature_series(&[30.0, 28.5, 27.2, 26.0, 24.8]);

    let alerts = engine.evaluate(&profile, &readings).await;

    let categories: Vec<_> = alerts.iter().map(|a| a.category).collect();
    assert_eq!(
        categories,
        vec![
            AlertCategory::Temperature,
            AlertCategory::Temperature,
            AlertCategory::Weather
        ]
    );
    assert_eq!(alerts[0].kind, AlertKind::Warning);
    assert!(alerts[1].title.contains("Quickly"));
}

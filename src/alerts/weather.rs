//! Outdoor weather lookup
//!
//! [`OpenWeatherClient`] talks to an OpenWeatherMap-compatible API: current
//! conditions from `/data/2.5/weather` and a 3-hourly forecast from
//! `/data/2.5/forecast`, folded into per-day minimum and maximum.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::AdvisoryError;
use crate::config::WeatherConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Outdoor temperature in °C
    pub temperature: f64,
    /// Outdoor relative humidity in %
    pub humidity: f64,
    pub description: String,
    /// Upcoming days, soonest first, today excluded
    pub forecast: Vec<ForecastDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub min: f64,
    pub max: f64,
}

#[async_trait]
pub trait WeatherAdvisory: Send + Sync {
    async fn current(&self) -> Result<WeatherSnapshot, AdvisoryError>;
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    dt: i64,
    main: MainBlock,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt: i64,
    main: ForecastMain,
}

#[derive(Debug, Deserialize)]
struct ForecastMain {
    temp_min: f64,
    temp_max: f64,
}

pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    latitude: f64,
    longitude: f64,
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, AdvisoryError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(AdvisoryError::NotConfigured("missing weather API key"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            latitude: config.latitude,
            longitude: config.longitude,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T, AdvisoryError> {
        let url = format!("{}/data/2.5/{endpoint}", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", self.latitude.to_string()),
                ("lon", self.longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdvisoryError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| AdvisoryError::InvalidResponse(e.to_string()))
    }
}

/// Fold 3-hourly entries into one min/max per calendar day (UTC), skipping `today`
fn daily_forecast(entries: &[ForecastEntry], today: Option<NaiveDate>) -> Vec<ForecastDay> {
    let mut days: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();

    for entry in entries {
        let Some(date) = DateTime::from_timestamp(entry.dt, 0).map(|dt| dt.date_naive()) else {
            continue;
        };
        if Some(date) == today {
            continue;
        }

        days.entry(date)
            .and_modify(|(min, max)| {
                *min = min.min(entry.main.temp_min);
                *max = max.max(entry.main.temp_max);
            })
            .or_insert((entry.main.temp_min, entry.main.temp_max));
    }

    days.into_iter()
        .map(|(date, (min, max))| ForecastDay { date, min, max })
        .collect()
}

#[async_trait]
impl WeatherAdvisory for OpenWeatherClient {
    #[instrument(skip(self))]
    async fn current(&self) -> Result<WeatherSnapshot, AdvisoryError> {
        let current: CurrentResponse = self.get("weather").await?;
        let today = DateTime::from_timestamp(current.dt, 0).map(|dt| dt.date_naive());

        // current conditions are still useful without a forecast
        let forecast = match self.get::<ForecastResponse>("forecast").await {
            Ok(response) => daily_forecast(&response.list, today),
            Err(e) => {
                warn!("forecast lookup failed: {e}");
                Vec::new()
            }
        };

        debug!(
            "outdoor {:.1}°C, {:.0}% humidity, {} forecast days",
            current.main.temp,
            current.main.humidity,
            forecast.len()
        );

        Ok(WeatherSnapshot {
            temperature: current.main.temp,
            humidity: current.main.humidity,
            description: current
                .weather
                .into_iter()
                .next()
                .map(|c| c.description)
                .unwrap_or_default(),
            forecast,
        })
    }
}

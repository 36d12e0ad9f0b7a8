//! Alert engine
//!
//! Owns the alert history and decides which passes run on a given
//! evaluation:
//!
//! ```text
//! evaluate(profile, readings)
//!   ├─ threshold pass   (latest reading vs. profile)
//!   ├─ trend pass       (mean successive delta over the window)
//!   └─ weather pass     (at most once per weather interval)
//!        → new alerts, prepended to history
//! ```
//!
//! The predictive pass is deliberately not part of `evaluate`: it is slow
//! and may hang, so the alert actor runs [`predict`] as a separate task and
//! feeds the outcome back through [`AlertEngine::record`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, trace};

use super::advisor::PredictiveAdvisor;
use super::rules::{self, Tolerances};
use super::weather::WeatherAdvisory;
use super::{Alert, AlertCategory, AlertHistory, AlertKind, Severity};
use crate::clock::Clock;
use crate::{Reading, SpeciesProfile};

/// Fewest readings the predictive pass will work with
pub const MIN_PREDICTION_READINGS: usize = 5;

/// Responses of this length or shorter are not worth an alert
pub const MIN_PREDICTION_LENGTH: usize = 20;

pub struct AlertEngine {
    history: AlertHistory,
    tolerances: Tolerances,
    clock: Arc<dyn Clock>,
    weather: Option<Arc<dyn WeatherAdvisory>>,
    weather_interval: chrono::Duration,
    last_weather_check: Option<DateTime<Utc>>,
}

impl AlertEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            history: AlertHistory::default(),
            tolerances: Tolerances::default(),
            clock,
            weather: None,
            weather_interval: chrono::Duration::minutes(30),
            last_weather_check: None,
        }
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    /// Consult `advisory` at most once per `interval`
    pub fn with_weather(mut self, advisory: Arc<dyn WeatherAdvisory>, interval: Duration) -> Self {
        self.weather = Some(advisory);
        self.weather_interval =
            chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::minutes(30));
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run threshold, trend and weather passes over `readings` (newest first)
    ///
    /// Returns only the alerts produced by this call, in pass order. They are
    /// also prepended to the history.
    #[instrument(skip_all, fields(readings = readings.len()))]
    pub async fn evaluate(&mut self, profile: &SpeciesProfile, readings: &[Reading]) -> Vec<Alert> {
        let now = self.clock.now();
        let mut alerts = Vec::new();

        if let Some(latest) = readings.first() {
            alerts.extend(rules::threshold_pass(profile, latest, &self.tolerances, now));
        }
        alerts.extend(rules::trend_pass(readings, now));
        alerts.extend(self.weather_pass(now).await);

        debug!("evaluation produced {} alerts", alerts.len());
        self.history.prepend(&alerts);
        alerts
    }

    async fn weather_pass(&mut self, now: DateTime<Utc>) -> Vec<Alert> {
        let Some(weather) = self.weather.clone() else {
            return Vec::new();
        };

        if let Some(last) = self.last_weather_check
            && now - last < self.weather_interval
        {
            trace!("weather checked at {last}, skipping");
            return Vec::new();
        }

        self.last_weather_check = Some(now);
        rules::weather_alerts(weather.current().await, now)
    }

    /// Merge alerts produced outside `evaluate`
    pub fn record(&mut self, alerts: &[Alert]) {
        self.history.prepend(alerts);
    }

    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        self.history.recent(limit)
    }

    pub fn by_category(&self, category: AlertCategory) -> Vec<Alert> {
        self.history.by_category(category)
    }

    pub fn clear(&mut self) -> usize {
        self.history.clear()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Predictive pass
///
/// Any failure, timeout or trivial answer yields `None`.
#[instrument(skip_all, fields(readings = readings.len()))]
pub async fn predict(
    advisor: &dyn PredictiveAdvisor,
    profile: &SpeciesProfile,
    readings: &[Reading],
    timeout: Duration,
    now: DateTime<Utc>,
) -> Option<Alert> {
    if readings.len() < MIN_PREDICTION_READINGS {
        trace!("not enough readings for a prediction");
        return None;
    }

    let prompt = rules::build_prompt(profile, readings);

    let answer = match tokio::time::timeout(timeout, advisor.ask(&prompt, rules::PREDICTION_CONTEXT)).await
    {
        Ok(Ok(answer)) => answer,
        Ok(Err(e)) => {
            debug!("predictive advisor failed: {e}");
            return None;
        }
        Err(_) => {
            debug!("predictive advisor timed out after {timeout:?}");
            return None;
        }
    };

    let answer = answer.trim();
    if answer.chars().count() <= MIN_PREDICTION_LENGTH {
        debug!("discarding trivial prediction");
        return None;
    }

    Some(
        Alert::new(
            AlertKind::Prediction,
            Severity::Medium,
            AlertCategory::System,
            format!("Outlook for {}", profile.name),
            answer,
            now,
        )
        .action_required(false),
    )
}

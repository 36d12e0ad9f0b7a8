//! Alert model and evaluation
//!
//! - [`rules`]: the pure threshold, trend and weather passes
//! - [`engine::AlertEngine`]: runs the passes and owns the bounded history
//! - [`weather`], [`advisor`]: HTTP collaborators consulted by the engine

pub mod advisor;
pub mod engine;
pub mod error;
pub mod rules;
pub mod weather;

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use engine::AlertEngine;
pub use error::AdvisoryError;

/// Maximum number of alerts kept in history
pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Warning,
    Critical,
    Info,
    Prediction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Temperature,
    Humidity,
    Moisture,
    Co2,
    Weather,
    System,
}

impl std::str::FromStr for AlertCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "temperature" => Ok(Self::Temperature),
            "humidity" => Ok(Self::Humidity),
            "moisture" => Ok(Self::Moisture),
            "co2" => Ok(Self::Co2),
            "weather" => Ok(Self::Weather),
            "system" => Ok(Self::System),
            other => Err(format!("unknown alert category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub category: AlertCategory,
    pub action_required: bool,
    pub recommendations: Vec<String>,
}

impl Alert {
    /// Create an alert with a fresh id
    ///
    /// Warnings and critical alerts require action by default. An empty
    /// message is replaced by the title so that no alert goes out blank.
    pub fn new(
        kind: AlertKind,
        severity: Severity,
        category: AlertCategory,
        title: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        let mut message = message.into();
        if message.trim().is_empty() {
            message = title.clone();
        }

        Self {
            id: Uuid::new_v4(),
            kind,
            title,
            message,
            timestamp,
            severity,
            category,
            action_required: matches!(kind, AlertKind::Warning | AlertKind::Critical),
            recommendations: Vec::new(),
        }
    }

    pub fn with_recommendations<I, S>(mut self, recommendations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommendations = recommendations.into_iter().map(Into::into).collect();
        self
    }

    pub fn action_required(mut self, required: bool) -> Self {
        self.action_required = required;
        self
    }
}

/// Newest-first alert buffer capped at [`HISTORY_CAPACITY`]
#[derive(Debug, Clone)]
pub struct AlertHistory {
    alerts: VecDeque<Alert>,
    capacity: usize,
}

impl Default for AlertHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl AlertHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            alerts: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Put `alerts` in front of the history, keeping their order, then drop
    /// whatever no longer fits
    pub fn prepend(&mut self, alerts: &[Alert]) {
        for alert in alerts.iter().rev() {
            self.alerts.push_front(alert.clone());
        }
        self.alerts.truncate(self.capacity);
    }

    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        self.alerts.iter().take(limit).cloned().collect()
    }

    pub fn by_category(&self, category: AlertCategory) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|alert| alert.category == category)
            .cloned()
            .collect()
    }

    /// Drop everything, returning how many alerts were removed
    pub fn clear(&mut self) -> usize {
        let removed = self.alerts.len();
        self.alerts.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

//! Evaluation passes
//!
//! Everything in here is a pure function of its inputs, the engine decides
//! when each pass runs and what happens with the result.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::weather::WeatherSnapshot;
use super::{AdvisoryError, Alert, AlertCategory, AlertKind, Severity};
use crate::{Range, Reading, SpeciesProfile};

/// Temperature trend (°C per reading) above which a trend alert is raised
pub const TEMPERATURE_TREND_LIMIT: f64 = 1.0;

/// Soil moisture trend (ratio per reading) above which a trend alert is raised
pub const MOISTURE_TREND_LIMIT: f64 = 0.05;

/// How far outside the optimal band a value may be before a breach turns critical
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tolerance {
    /// Fraction of the boundary itself: `min * (1 - r)` and `max * (1 + r)`
    Ratio(f64),
    /// Fixed slack in the metric's unit: `min - s` and `max + s`
    Absolute(f64),
}

impl Tolerance {
    fn lower_limit(self, min: f64) -> f64 {
        match self {
            Tolerance::Ratio(r) => min * (1.0 - r),
            Tolerance::Absolute(slack) => min - slack,
        }
    }

    fn upper_limit(self, max: f64) -> f64 {
        match self {
            Tolerance::Ratio(r) => max * (1.0 + r),
            Tolerance::Absolute(slack) => max + slack,
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::Ratio(0.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub temperature: Tolerance,
    pub humidity: Tolerance,
    pub soil_moisture: Tolerance,
    pub co2: Tolerance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Low,
    High,
}

/// Outcome of comparing one value against its optimal band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdEvaluation {
    Ok,
    Warning(Direction),
    Critical(Direction),
}

impl ThresholdEvaluation {
    pub fn evaluate(value: f64, range: Range, tolerance: Tolerance) -> ThresholdEvaluation {
        if range.contains(value) {
            return ThresholdEvaluation::Ok;
        }

        if value < range.min {
            if value >= tolerance.lower_limit(range.min) {
                return ThresholdEvaluation::Warning(Direction::Low);
            }
            return ThresholdEvaluation::Critical(Direction::Low);
        }

        if value <= tolerance.upper_limit(range.max) {
            return ThresholdEvaluation::Warning(Direction::High);
        }

        ThresholdEvaluation::Critical(Direction::High)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Temperature,
    Humidity,
    SoilMoisture,
    Co2,
}

impl Metric {
    fn name(self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature",
            Metric::Humidity => "Humidity",
            Metric::SoilMoisture => "Soil Moisture",
            Metric::Co2 => "CO2",
        }
    }

    fn category(self) -> AlertCategory {
        match self {
            Metric::Temperature => AlertCategory::Temperature,
            Metric::Humidity => AlertCategory::Humidity,
            Metric::SoilMoisture => AlertCategory::Moisture,
            Metric::Co2 => AlertCategory::Co2,
        }
    }

    fn format(self, value: f64) -> String {
        match self {
            Metric::Temperature => format!("{value:.1}°C"),
            Metric::Humidity => format!("{value:.1}%"),
            Metric::SoilMoisture => format!("{value:.2}"),
            Metric::Co2 => format!("{value:.0} ppm"),
        }
    }

    fn recommendations(self, direction: Direction) -> &'static [&'static str] {
        match (self, direction) {
            (Metric::Temperature, Direction::Low) => &[
                "Turn on greenhouse heating",
                "Close vents and reduce air exchange",
                "Cover sensitive plants overnight",
            ],
            (Metric::Temperature, Direction::High) => &[
                "Open vents or roof windows",
                "Run circulation fans",
                "Deploy shade cloth during peak sun",
            ],
            (Metric::Humidity, Direction::Low) => &[
                "Run the misting system or humidifier",
                "Damp down paths and benches",
                "Reduce ventilation temporarily",
            ],
            (Metric::Humidity, Direction::High) => &[
                "Increase ventilation",
                "Run the dehumidifier",
                "Avoid wetting foliage late in the day",
            ],
            (Metric::SoilMoisture, Direction::Low) => &[
                "Irrigate now",
                "Check drip lines for blockages",
                "Mulch the soil surface to reduce evaporation",
            ],
            (Metric::SoilMoisture, Direction::High) => &[
                "Pause irrigation",
                "Check drainage holes and trays",
                "Loosen compacted soil to improve drainage",
            ],
            (Metric::Co2, Direction::Low) => &[
                "Reduce ventilation to let CO2 build up",
                "Consider CO2 supplementation during daylight",
            ],
            (Metric::Co2, Direction::High) => &[
                "Increase ventilation",
                "Check CO2 supplementation settings",
            ],
        }
    }

    fn breach_alert(
        self,
        evaluation: ThresholdEvaluation,
        value: f64,
        range: Range,
        timestamp: DateTime<Utc>,
    ) -> Option<Alert> {
        let (kind, severity, direction) = match evaluation {
            ThresholdEvaluation::Ok => return None,
            ThresholdEvaluation::Warning(d) => (AlertKind::Warning, Severity::Medium, d),
            ThresholdEvaluation::Critical(d) => (AlertKind::Critical, Severity::High, d),
        };

        let (level, relation) = match direction {
            Direction::Low => ("Low", "below"),
            Direction::High => ("High", "above"),
        };
        let title = match kind {
            AlertKind::Critical => format!("Critical {level} {}", self.name()),
            _ => format!("{level} {}", self.name()),
        };
        let message = format!(
            "{} is {}, {relation} the optimal range of {} to {}",
            self.name(),
            self.format(value),
            self.format(range.min),
            self.format(range.max),
        );

        Some(
            Alert::new(kind, severity, self.category(), title, message, timestamp)
                .with_recommendations(self.recommendations(direction).iter().copied()),
        )
    }
}

/// Compare the latest reading against the profile
pub fn threshold_pass(
    profile: &SpeciesProfile,
    latest: &Reading,
    tolerances: &Tolerances,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut checks = vec![
        (Metric::Temperature, latest.temperature, profile.temperature, tolerances.temperature),
        (Metric::Humidity, latest.humidity, profile.humidity, tolerances.humidity),
        (
            Metric::SoilMoisture,
            latest.soil_moisture,
            profile.soil_moisture,
            tolerances.soil_moisture,
        ),
    ];
    if let Some(co2) = profile.co2 {
        checks.push((Metric::Co2, latest.co2_level as f64, co2, tolerances.co2));
    }

    checks
        .into_iter()
        .filter_map(|(metric, value, range, tolerance)| {
            let evaluation = ThresholdEvaluation::evaluate(value, range, tolerance);
            metric.breach_alert(evaluation, value, range, now)
        })
        .collect()
}

/// Mean of `v[i-1] - v[i]` over a newest-first series
///
/// Positive means the value has been rising. `None` for fewer than two values.
pub fn mean_successive_delta(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let sum: f64 = values.windows(2).map(|pair| pair[0] - pair[1]).sum();
    Some(sum / (values.len() - 1) as f64)
}

/// Flag fast-moving temperature and soil moisture, whatever their absolute value
pub fn trend_pass(readings: &[Reading], now: DateTime<Utc>) -> Vec<Alert> {
    let temperatures: Vec<f64> = readings.iter().map(|r| r.temperature).collect();
    let moistures: Vec<f64> = readings.iter().map(|r| r.soil_moisture).collect();

    [
        (Metric::Temperature, temperatures, TEMPERATURE_TREND_LIMIT),
        (Metric::SoilMoisture, moistures, MOISTURE_TREND_LIMIT),
    ]
    .into_iter()
    .filter_map(|(metric, values, limit)| {
        let trend = mean_successive_delta(&values)?;
        if trend.abs() <= limit {
            return None;
        }
        Some(trend_alert(metric, trend, values.len(), now))
    })
    .collect()
}

fn trend_alert(metric: Metric, trend: f64, window: usize, now: DateTime<Utc>) -> Alert {
    let (verb, direction) = if trend > 0.0 {
        ("Rising", Direction::High)
    } else {
        ("Falling", Direction::Low)
    };

    let title = format!("{} {verb} Quickly", metric.name());
    let message = format!(
        "{} is {} by {} per reading over the last {window} readings",
        metric.name(),
        verb.to_lowercase(),
        metric.format(trend.abs()),
    );

    Alert::new(
        AlertKind::Warning,
        Severity::Medium,
        metric.category(),
        title,
        message,
        now,
    )
    .with_recommendations(metric.recommendations(direction).iter().copied())
}

/// Outdoor advisories from a weather lookup
pub fn weather_alerts(
    snapshot: Result<WeatherSnapshot, AdvisoryError>,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let snapshot = match snapshot {
        Ok(snapshot) => snapshot,
        Err(e) => {
            return vec![
                Alert::new(
                    AlertKind::Info,
                    Severity::Low,
                    AlertCategory::Weather,
                    "Weather data unavailable",
                    format!("Outdoor conditions could not be retrieved: {e}"),
                    now,
                )
                .with_recommendations(["Monitor greenhouse conditions manually"]),
            ];
        }
    };

    let mut alerts = Vec::new();

    if snapshot.temperature < 5.0 {
        alerts.push(
            Alert::new(
                AlertKind::Warning,
                Severity::Medium,
                AlertCategory::Weather,
                "Cold Weather Outside",
                format!("Outdoor temperature is {:.1}°C", snapshot.temperature),
                now,
            )
            .with_recommendations([
                "Check greenhouse heating",
                "Close vents before nightfall",
            ]),
        );
    } else if snapshot.temperature > 35.0 {
        alerts.push(
            Alert::new(
                AlertKind::Warning,
                Severity::Medium,
                AlertCategory::Weather,
                "Extreme Heat Outside",
                format!("Outdoor temperature is {:.1}°C", snapshot.temperature),
                now,
            )
            .with_recommendations(["Deploy shade cloth", "Increase ventilation and watering"]),
        );
    }

    if snapshot.humidity > 85.0 {
        alerts.push(
            Alert::new(
                AlertKind::Info,
                Severity::Low,
                AlertCategory::Weather,
                "High Outdoor Humidity",
                format!("Outdoor humidity is {:.0}%", snapshot.humidity),
                now,
            )
            .with_recommendations(["Limit intake of humid outside air", "Watch for fungal disease"]),
        );
    }

    if let Some(next) = snapshot.forecast.first()
        && (next.min < 10.0 || next.max > 30.0)
    {
        let mut message = format!(
            "Forecast for {}: {:.1}°C to {:.1}°C",
            next.date, next.min, next.max
        );
        let mut recommendations = Vec::new();
        if next.min < 10.0 {
            message.push_str(", cold night expected");
            recommendations.push("Plan for extra heating overnight");
        }
        if next.max > 30.0 {
            message.push_str(", hot day expected");
            recommendations.push("Prepare shading and extra irrigation");
        }

        alerts.push(
            Alert::new(
                AlertKind::Info,
                Severity::Low,
                AlertCategory::Weather,
                "Weather Outlook",
                message,
                now,
            )
            .with_recommendations(recommendations)
            .action_required(false),
        );
    }

    alerts
}

/// Instruction sent alongside every predictive prompt
pub const PREDICTION_CONTEXT: &str = "You are an experienced greenhouse horticulturist. \
    Given recent sensor readings and the optimal ranges for the crop, predict how conditions \
    will develop over the next hours and recommend concrete actions. Answer in a few sentences.";

/// Natural-language prompt with the last ten readings and the profile ranges
pub fn build_prompt(profile: &SpeciesProfile, readings: &[Reading]) -> String {
    let mut prompt = format!(
        "Crop: {}\nOptimal ranges: temperature {:.1}-{:.1}°C, humidity {:.0}-{:.0}%, soil moisture {:.2}-{:.2}",
        profile.name,
        profile.temperature.min,
        profile.temperature.max,
        profile.humidity.min,
        profile.humidity.max,
        profile.soil_moisture.min,
        profile.soil_moisture.max,
    );
    if let Some(co2) = profile.co2 {
        let _ = write!(prompt, ", CO2 {:.0}-{:.0} ppm", co2.min, co2.max);
    }
    if let Some(light) = profile.light {
        let _ = write!(prompt, ", light {:.0}-{:.0}", light.min, light.max);
    }

    prompt.push_str("\n\nRecent readings (newest first):\n");
    for reading in readings.iter().take(10) {
        let _ = write!(
            prompt,
            "- {}: temperature {:.1}°C, humidity {:.1}%, soil moisture {:.2}, CO2 {} ppm",
            reading.timestamp.format("%Y-%m-%d %H:%M"),
            reading.temperature,
            reading.humidity,
            reading.soil_moisture,
            reading.co2_level,
        );
        if let Some(light) = reading.light_level {
            let _ = write!(prompt, ", light {light:.0}");
        }
        prompt.push('\n');
    }

    prompt
}

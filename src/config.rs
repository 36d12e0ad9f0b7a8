use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, trace, warn};

use crate::SpeciesProfile;
use crate::alerts::rules::Tolerances;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        /// Retention period in days (readings older than this are deleted)
        #[serde(default = "default_retention_days")]
        retention_days: u32,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::None
    }
}

impl StorageConfig {
    pub fn retention_days(&self) -> Option<u32> {
        match self {
            StorageConfig::None => None,
            StorageConfig::Sqlite { retention_days, .. } => Some(*retention_days),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./telemetry.db")
}

fn default_retention_days() -> u32 {
    30
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub alerts: AlertConfig,

    #[serde(default)]
    pub hub: HubConfig,

    /// Storage configuration (defaults to in-memory)
    #[serde(default)]
    pub storage: StorageConfig,

    /// Species profile used until another one is selected
    #[serde(default)]
    pub profile: SpeciesProfile,

    pub weather: Option<WeatherConfig>,

    pub advisor: Option<AdvisorConfig>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SensorConfig {
    /// Serial device carrying the newline-delimited JSON protocol
    pub device: Option<String>,

    /// Line speed of the serial device (default 9600)
    pub baud_rate: Option<u32>,

    /// Simulation interval in seconds
    #[serde(default = "default_sensor_interval")]
    pub interval: u64,

    /// Switch to simulated readings when the hardware goes away
    #[serde(default = "default_true")]
    pub fallback_to_simulation: bool,
}

impl SensorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE)
    }
}

const DEFAULT_BAUD_RATE: u32 = 9600;

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: None,
            interval: default_sensor_interval(),
            fallback_to_simulation: true,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AlertConfig {
    /// Evaluation interval in seconds
    #[serde(default = "default_alert_interval")]
    pub interval: u64,

    /// Number of most recent readings considered per evaluation
    #[serde(default = "default_window")]
    pub window: usize,

    /// Minimum seconds between two weather lookups
    #[serde(default = "default_weather_interval")]
    pub weather_interval: u64,

    /// Timeout in seconds for a single predictive advisor call
    #[serde(default = "default_predictive_timeout")]
    pub predictive_timeout: u64,

    #[serde(default)]
    pub tolerances: Tolerances,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            interval: default_alert_interval(),
            window: default_window(),
            weather_interval: default_weather_interval(),
            predictive_timeout: default_predictive_timeout(),
            tolerances: Tolerances::default(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Heartbeat interval in seconds per subscriber
    #[serde(default = "default_heartbeat")]
    pub heartbeat: u64,

    /// Deliver events only for topics a subscriber declared
    #[serde(default)]
    pub filter_by_topic: bool,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl HubConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat.max(1))
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            heartbeat: default_heartbeat(),
            filter_by_topic: false,
            enable_cors: true,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "default_advisor_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_true() -> bool {
    true
}

fn default_sensor_interval() -> u64 {
    30
}

fn default_alert_interval() -> u64 {
    120
}

fn default_window() -> usize {
    20
}

fn default_weather_interval() -> u64 {
    30 * 60
}

fn default_predictive_timeout() -> u64 {
    30
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_heartbeat() -> u64 {
    30
}

fn default_weather_url() -> String {
    "https://api.openweathermap.org".to_string()
}

fn default_advisor_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    300
}

const SERIAL_PORT: &str = "SERIAL_PORT";
const SERIAL_BAUDRATE: &str = "SERIAL_BAUDRATE";
const OPENWEATHER_API_KEY: &str = "OPENWEATHER_API_KEY";
const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

impl Config {
    /// Fill secrets and the serial settings from the environment
    ///
    /// Values already present in the file win over the environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.sensor.device.is_none() {
            self.sensor.device = lookup(SERIAL_PORT);
        }

        if self.sensor.baud_rate.is_none()
            && let Some(raw) = lookup(SERIAL_BAUDRATE)
        {
            match raw.trim().parse() {
                Ok(baud_rate) => self.sensor.baud_rate = Some(baud_rate),
                Err(e) => warn!("ignoring {SERIAL_BAUDRATE}={raw}: {e}"),
            }
        }

        if let Some(weather) = &mut self.weather
            && weather.api_key.is_none()
        {
            weather.api_key = lookup(OPENWEATHER_API_KEY);
        }

        if let Some(advisor) = &mut self.advisor
            && advisor.api_key.is_none()
        {
            advisor.api_key = lookup(OPENAI_API_KEY);
        }
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config {path}"))?;
    parse_config(&file_content)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    let mut config: Config = serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?;
    config.apply_env();
    debug!("storage backend: {:?}", config.storage);
    trace!("loaded config: {config:?}");
    Ok(config)
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use greenhouse_telemetry::{
    actors::{
        alert::{AlertDeps, AlertHandle, AlertSettings},
        hub::{HubHandle, HubSettings},
        ingest::IngestHandle,
        sensor::SensorHandle,
    },
    alerts::{
        AlertEngine,
        advisor::{ChatCompletionsAdvisor, PredictiveAdvisor},
        weather::OpenWeatherClient,
    },
    api::{ApiConfig, ApiState, spawn_api_server},
    clock::SystemClock,
    config::{Config, read_config_file},
    profile::SharedProfile,
    storage,
};
use tokio::sync::broadcast;
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Capacity of the sensor event channel
const SENSOR_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Parser)]
#[command(name = "greenhouse-hub")]
#[command(about = "Greenhouse telemetry hub: sensors, alerts and live streaming")]
struct Args {
    /// Config file (JSON); defaults apply when omitted
    #[arg(short, long)]
    file: Option<String>,

    /// Bind address (overrides config file)
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("greenhouse_telemetry", LevelFilter::DEBUG),
        ("greenhouse_hub", LevelFilter::TRACE),
        ("tower_http", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => {
            let mut config = Config::default();
            config.apply_env();
            config
        }
    };
    if let Some(bind) = args.bind {
        config.hub.bind_addr = bind;
    }

    let store = storage::open(&config.storage)
        .await
        .context("failed to open telemetry store")?;

    let hub = HubHandle::spawn(HubSettings::from(&config.hub));

    // subscribe the pipeline before the sensor starts so the first status is seen
    let (sensor_tx, sensor_rx) = broadcast::channel(SENSOR_CHANNEL_CAPACITY);
    let ingest = IngestHandle::spawn(
        store.clone(),
        hub.clone(),
        sensor_rx,
        config.storage.retention_days(),
    );
    let sensor = SensorHandle::from_config(&config.sensor, sensor_tx).await;

    let profile = Arc::new(SharedProfile::new(config.profile.clone()));
    let alerts = AlertHandle::spawn(
        alert_engine(&config),
        AlertDeps {
            store: store.clone(),
            profile: profile.clone(),
            hub: hub.clone(),
            advisor: predictive_advisor(&config),
        },
        AlertSettings::from(&config.alerts),
    );

    let state = ApiState {
        store,
        hub: hub.clone(),
        sensor: sensor.clone(),
        alerts: alerts.clone(),
        ingest: ingest.clone(),
        profile,
    };
    let addr = spawn_api_server(ApiConfig::from(&config.hub), state).await?;
    info!("hub ready, stream at ws://{addr}/api/v1/stream");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");

    for (name, result) in [
        ("sensor", sensor.shutdown().await),
        ("alerts", alerts.shutdown().await),
        ("ingest", ingest.shutdown().await),
        ("hub", hub.shutdown().await),
    ] {
        if let Err(e) = result {
            debug!("{name} actor already stopped: {e:#}");
        }
    }

    Ok(())
}

fn alert_engine(config: &Config) -> AlertEngine {
    let engine =
        AlertEngine::new(Arc::new(SystemClock)).with_tolerances(config.alerts.tolerances);

    let Some(weather) = &config.weather else {
        info!("no weather location configured, weather pass disabled");
        return engine;
    };

    match OpenWeatherClient::new(weather) {
        Ok(client) => engine.with_weather(
            Arc::new(client),
            Duration::from_secs(config.alerts.weather_interval),
        ),
        Err(e) => {
            warn!("weather pass disabled: {e}");
            engine
        }
    }
}

fn predictive_advisor(config: &Config) -> Option<Arc<dyn PredictiveAdvisor>> {
    let advisor = config.advisor.as_ref()?;

    match ChatCompletionsAdvisor::new(advisor) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("predictive pass disabled: {e}");
            None
        }
    }
}

//! Terminal subscriber
//!
//! Connects to a hub's stream endpoint, logs every event it receives and
//! exits once the connection is permanently failed or closed by the hub.

use std::time::Duration;

use clap::Parser;
use greenhouse_telemetry::{
    connector::{ConnectionState, ConnectorBuilder, ReconnectPolicy},
    hub::{Envelope, EventType, Topic},
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(name = "greenhouse-monitor")]
#[command(about = "Log live events from a greenhouse hub")]
struct Args {
    /// Stream endpoint of the hub
    #[arg(short, long, default_value = "ws://127.0.0.1:8080/api/v1/stream")]
    url: String,

    /// Topics to subscribe to (telemetry, alerts, analysis, hardware)
    #[arg(short, long, value_delimiter = ',')]
    topics: Vec<Topic>,

    /// Reconnect attempts before giving up
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,

    /// Keep-alive ping interval in seconds
    #[arg(long, default_value_t = 30)]
    keep_alive: u64,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("greenhouse_telemetry", LevelFilter::INFO),
        ("greenhouse_monitor", LevelFilter::TRACE),
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

fn log_event(envelope: &Envelope) {
    let timestamp = envelope
        .timestamp
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    info!("{timestamp} {:?}: {}", envelope.kind, envelope.data);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let policy = ReconnectPolicy {
        max_attempts: args.max_attempts,
        ..ReconnectPolicy::default()
    };

    let mut builder = ConnectorBuilder::new(&args.url)
        .policy(policy)
        .keep_alive(Duration::from_secs(args.keep_alive.max(1)))
        .on(EventType::NewAlerts, |envelope| {
            let count = envelope.data.as_array().map_or(0, Vec::len);
            warn!("{count} new alert(s)");
        })
        .on_any(log_event);
    for topic in &args.topics {
        builder = builder.subscribe(*topic);
    }

    let connector = builder.spawn();

    tokio::select! {
        state = connector.wait_for(|state| state.is_terminal()) => {
            match state? {
                ConnectionState::PermanentlyFailed => {
                    anyhow::bail!("hub at {} is unreachable", args.url)
                }
                state => info!("connection ended: {state:?}"),
            }
        }

        result = tokio::signal::ctrl_c() => {
            result?;
            connector.close().await?;
        }
    }

    Ok(())
}

//! SensorActor - Drives the active sensor source
//!
//! ## Message Flow
//!
//! ```text
//! Source event → SensorEvent → broadcast → [ingest pipeline, ...]
//!     ↑
//!     └─── Commands (Actuate, GetStatus, Shutdown)
//! ```
//!
//! When the hardware transport goes away the actor publishes a status event
//! and either switches to a simulated source or idles, depending on
//! configuration.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::SensorConfig;
use crate::sensor::frame::ActuatorCommand;
use crate::sensor::hardware::HardwareSource;
use crate::sensor::simulated::SimulatedSource;
use crate::sensor::{SensorSource, SourceEvent, SourceKind};

use super::messages::{SensorCommand, SensorEvent, SensorStatus};

pub struct SensorActor {
    /// `None` while idle
    source: Option<Box<dyn SensorSource>>,

    /// Simulation period to fall back to when the hardware disconnects
    fallback: Option<Duration>,

    command_rx: mpsc::Receiver<SensorCommand>,

    event_tx: broadcast::Sender<SensorEvent>,

    readings_count: u64,

    last_reading: Option<DateTime<Utc>>,
}

/// Wait for the next event of `source`, forever if there is none
async fn next_event(source: &mut Option<Box<dyn SensorSource>>) -> Option<SourceEvent> {
    match source {
        Some(source) => source.next_event().await,
        None => std::future::pending().await,
    }
}

impl SensorActor {
    pub fn new(
        source: Box<dyn SensorSource>,
        fallback: Option<Duration>,
        command_rx: mpsc::Receiver<SensorCommand>,
        event_tx: broadcast::Sender<SensorEvent>,
    ) -> Self {
        Self {
            source: Some(source),
            fallback,
            command_rx,
            event_tx,
            readings_count: 0,
            last_reading: None,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting sensor actor");
        self.publish(SensorEvent::Status(self.status()));

        loop {
            tokio::select! {
                event = next_event(&mut self.source) => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => self.handle_disconnect(),
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SensorCommand::Actuate { command, respond_to }) => {
                            let sent = self.actuate(command).await;
                            let _ = respond_to.send(sent);
                        }

                        Some(SensorCommand::GetStatus { respond_to }) => {
                            let _ = respond_to.send(self.status());
                        }

                        Some(SensorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("sensor actor stopped");
    }

    fn handle_event(&mut self, event: SourceEvent) {
        if let SourceEvent::Reading(reading) = &event {
            self.readings_count += 1;
            self.last_reading = Some(reading.timestamp);
            trace!("reading #{}: {:.1}°C", self.readings_count, reading.temperature);
        }

        self.publish(event.into());
    }

    fn handle_disconnect(&mut self) {
        let device = self
            .source
            .as_ref()
            .and_then(|s| s.device().map(str::to_string))
            .unwrap_or_else(|| "sensor".to_string());

        warn!("{device} disconnected");
        self.source = None;
        self.publish(SensorEvent::Status(self.status()));

        if let Some(period) = self.fallback.take() {
            info!("falling back to simulated readings every {period:?}");
            self.source = Some(Box::new(SimulatedSource::new(period)));
            self.publish(SensorEvent::Status(self.status()));
        }
    }

    async fn actuate(&mut self, command: ActuatorCommand) -> bool {
        let Some(source) = self.source.as_mut() else {
            debug!("no source, dropping actuator command '{}'", command.command);
            return false;
        };

        match source.send_command(&command).await {
            Ok(true) => {
                self.publish(SensorEvent::ActuatorUpdated(command));
                true
            }
            Ok(false) => {
                debug!("source cannot actuate '{}'", command.command);
                false
            }
            Err(e) => {
                warn!("failed to send actuator command '{}': {e}", command.command);
                false
            }
        }
    }

    fn status(&self) -> SensorStatus {
        let kind = self.source.as_ref().map(|s| s.kind());
        SensorStatus {
            connected: kind == Some(SourceKind::Hardware),
            source: kind,
            device: self
                .source
                .as_ref()
                .and_then(|s| s.device().map(str::to_string)),
            readings_count: self.readings_count,
            last_reading: self.last_reading,
        }
    }

    fn publish(&self, event: SensorEvent) {
        // no subscribers is fine, e.g. during startup
        match self.event_tx.send(event) {
            Ok(receivers) => trace!("published sensor event to {receivers} receivers"),
            Err(_) => trace!("no receivers for sensor event"),
        }
    }
}

/// Build the source described by the configuration
///
/// A configured device that cannot be opened degrades to simulation.
pub async fn open_source(config: &SensorConfig) -> Box<dyn SensorSource> {
    if let Some(device) = &config.device {
        match HardwareSource::open(device, config.baud_rate()) {
            Ok(source) => {
                info!("reading sensors from {device} at {} baud", config.baud_rate());
                return Box::new(source);
            }
            Err(e) => warn!("cannot open {device}: {e}, using simulated readings"),
        }
    } else {
        info!("no sensor device configured, using simulated readings");
    }

    Box::new(SimulatedSource::new(config.interval()))
}

/// Handle for controlling a SensorActor
#[derive(Clone)]
pub struct SensorHandle {
    sender: mpsc::Sender<SensorCommand>,
}

impl SensorHandle {
    pub fn spawn(
        source: Box<dyn SensorSource>,
        fallback: Option<Duration>,
        event_tx: broadcast::Sender<SensorEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SensorActor::new(source, fallback, cmd_rx, event_tx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Open the configured source and spawn an actor for it
    pub async fn from_config(
        config: &SensorConfig,
        event_tx: broadcast::Sender<SensorEvent>,
    ) -> Self {
        let source = open_source(config).await;
        let fallback = config.fallback_to_simulation.then(|| config.interval());
        Self::spawn(source, fallback, event_tx)
    }

    /// Forward an actuator command; `false` if no hardware took it
    pub async fn send_command(&self, command: ActuatorCommand) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SensorCommand::Actuate {
                command,
                respond_to: tx,
            })
            .await
            .context("failed to send Actuate command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn status(&self) -> Result<SensorStatus> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SensorCommand::GetStatus { respond_to: tx })
            .await
            .context("failed to send GetStatus command")?;

        rx.await.context("failed to receive response")
    }

    /// Gracefully shut down the sensor actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SensorCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}

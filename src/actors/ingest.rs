//! IngestActor - Persists readings and forwards sensor events to the hub
//!
//! ## Event mapping
//!
//! | Sensor event       | Persisted | Hub event          |
//! |--------------------|-----------|--------------------|
//! | `Reading`          | yes       | `telemetry_update` |
//! | `Ack`              | no        | `arduino_ack`      |
//! | `Fault`            | no        | `arduino_error`    |
//! | `Status`           | no        | `sensor_status`    |
//! | `ActuatorUpdated`  | no        | `actuator_updated` |
//!
//! A reading the store fails to write is still broadcast: live dashboards
//! should not go dark because the database hiccups.
//!
//! With a retention period configured the actor also deletes old readings
//! once a day.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::hub::EventType;
use crate::storage::TelemetryStore;

use super::hub::HubHandle;
use super::messages::{IngestCommand, IngestStats, SensorEvent};

/// Cleanup interval - run retention cleanup daily
const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct IngestActor {
    store: Arc<dyn TelemetryStore>,

    hub: HubHandle,

    sensor_rx: broadcast::Receiver<SensorEvent>,

    command_rx: mpsc::Receiver<IngestCommand>,

    /// Readings older than this are deleted by the daily cleanup
    retention: Option<chrono::Duration>,

    stats: IngestStats,
}

impl IngestActor {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        hub: HubHandle,
        sensor_rx: broadcast::Receiver<SensorEvent>,
        command_rx: mpsc::Receiver<IngestCommand>,
        retention_days: Option<u32>,
    ) -> Self {
        if let Some(days) = retention_days {
            debug!("retention cleanup enabled: {days} days");
        }

        Self {
            store,
            hub,
            sensor_rx,
            command_rx,
            retention: retention_days.map(|days| chrono::Duration::days(days as i64)),
            stats: IngestStats::default(),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting ingest actor");

        let mut cleanup_timer = time::interval(CLEANUP_INTERVAL);

        loop {
            tokio::select! {
                result = self.sensor_rx.recv() => {
                    match result {
                        Ok(event) => self.handle_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("ingest actor lagged, skipped {skipped} sensor events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("sensor channel closed, shutting down");
                            break;
                        }
                    }
                }

                _ = cleanup_timer.tick(), if self.retention.is_some() => {
                    self.run_cleanup().await;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(IngestCommand::GetStats { respond_to }) => {
                            let _ = respond_to.send(self.stats.clone());
                        }
                        Some(IngestCommand::Shutdown) => {
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

        debug!("ingest actor stopped");
    }

    async fn handle_event(&mut self, event: SensorEvent) {
        let (kind, data) = match event {
            SensorEvent::Reading(reading) => {
                let reading = match self.store.insert(reading.clone()).await {
                    Ok(stored) => {
                        self.stats.persisted += 1;
                        stored
                    }
                    Err(e) => {
                        error!("failed to persist reading: {e}");
                        self.stats.persist_failures += 1;
                        reading
                    }
                };
                (EventType::TelemetryUpdate, to_value(&reading))
            }

            SensorEvent::Ack {
                command,
                success,
                message,
            } => (
                EventType::ArduinoAck,
                json!({ "command": command, "success": success, "message": message }),
            ),

            SensorEvent::Fault { message, code } => {
                warn!("hardware reported error: {message}");
                (
                    EventType::ArduinoError,
                    json!({ "message": message, "code": code }),
                )
            }

            SensorEvent::Status(status) => (EventType::SensorStatus, to_value(&status)),

            SensorEvent::ActuatorUpdated(command) => {
                (EventType::ActuatorUpdated, to_value(&command))
            }
        };

        match self.hub.publish(kind, data).await {
            Ok(()) => {
                self.stats.published += 1;
                trace!("forwarded {kind:?} to hub");
            }
            Err(e) => warn!("failed to forward {kind:?} to hub: {e:#}"),
        }
    }

    async fn run_cleanup(&mut self) {
        let Some(retention) = self.retention else {
            return;
        };

        let cutoff = Utc::now() - retention;
        info!("running retention cleanup (cutoff: {cutoff})");

        match self.store.cleanup_before(cutoff).await {
            Ok(deleted) => {
                self.stats.total_deleted += deleted as u64;
                self.stats.last_cleanup = Some(Utc::now());
                info!("retention cleanup removed {deleted} readings");
            }
            Err(e) => error!("retention cleanup failed: {e}"),
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!("failed to serialize event payload: {e}");
        Value::Null
    })
}

/// Handle for controlling an IngestActor
#[derive(Clone)]
pub struct IngestHandle {
    sender: mpsc::Sender<IngestCommand>,
}

impl IngestHandle {
    pub fn spawn(
        store: Arc<dyn TelemetryStore>,
        hub: HubHandle,
        sensor_rx: broadcast::Receiver<SensorEvent>,
        retention_days: Option<u32>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = IngestActor::new(store, hub, sensor_rx, cmd_rx, retention_days);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    pub async fn stats(&self) -> Result<IngestStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(IngestCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive response")
    }

    /// Gracefully shut down the ingest actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(IngestCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}

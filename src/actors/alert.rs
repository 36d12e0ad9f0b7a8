//! AlertActor - Periodically evaluates readings and publishes alerts
//!
//! ## Evaluation cycle
//!
//! ```text
//! tick ─► profile + latest N readings ─► engine.evaluate ─► new_alerts
//!                                   └──► predictive task (own timeout)
//!                                              │
//!            history ◄── record ◄── prediction ◄┘ ─► new_alerts + ai_analysis
//! ```
//!
//! The predictive call runs in its own task. A slow or unreachable advisor
//! therefore never delays the next threshold/trend cycle, and its result is
//! merged into the history whenever it arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument, trace, warn};

use crate::alerts::advisor::PredictiveAdvisor;
use crate::alerts::engine::{self, MIN_PREDICTION_READINGS};
use crate::alerts::{Alert, AlertCategory, AlertEngine};
use crate::config::AlertConfig;
use crate::hub::EventType;
use crate::profile::SpeciesProfileLookup;
use crate::storage::TelemetryStore;
use crate::{Reading, SpeciesProfile};

use super::hub::HubHandle;
use super::messages::AlertCommand;

#[derive(Debug, Clone, Copy)]
pub struct AlertSettings {
    pub interval: Duration,
    pub window: usize,
    pub predictive_timeout: Duration,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            window: 20,
            predictive_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&AlertConfig> for AlertSettings {
    fn from(config: &AlertConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval.max(1)),
            window: config.window.max(1),
            predictive_timeout: Duration::from_secs(config.predictive_timeout.max(1)),
        }
    }
}

/// Collaborators the alert actor reads from and publishes to
#[derive(Clone)]
pub struct AlertDeps {
    pub store: Arc<dyn TelemetryStore>,
    pub profile: Arc<dyn SpeciesProfileLookup>,
    pub hub: HubHandle,
    pub advisor: Option<Arc<dyn PredictiveAdvisor>>,
}

pub struct AlertActor {
    engine: AlertEngine,
    deps: AlertDeps,
    settings: AlertSettings,
    command_rx: mpsc::Receiver<AlertCommand>,
    prediction_tx: mpsc::UnboundedSender<Alert>,
    prediction_rx: mpsc::UnboundedReceiver<Alert>,
}

impl AlertActor {
    pub fn new(
        engine: AlertEngine,
        deps: AlertDeps,
        settings: AlertSettings,
        command_rx: mpsc::Receiver<AlertCommand>,
    ) -> Self {
        let (prediction_tx, prediction_rx) = mpsc::unbounded_channel();

        Self {
            engine,
            deps,
            settings,
            command_rx,
            prediction_tx,
            prediction_rx,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting alert actor, evaluating every {:?}", self.settings.interval);

        let mut ticker = interval_at(
            Instant::now() + self.settings.interval,
            self.settings.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }

                Some(prediction) = self.prediction_rx.recv() => {
                    self.handle_prediction(prediction).await;
                }

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };

                    match cmd {
                        AlertCommand::EvaluateNow { respond_to } => {
                            let alerts = self.run_cycle().await;
                            let _ = respond_to.send(alerts);
                        }

                        AlertCommand::Recent { limit, respond_to } => {
                            let _ = respond_to.send(self.engine.recent(limit));
                        }

                        AlertCommand::ByCategory { category, respond_to } => {
                            let _ = respond_to.send(self.engine.by_category(category));
                        }

                        AlertCommand::Clear { respond_to } => {
                            let removed = self.engine.clear();
                            info!("alert history cleared ({removed} alerts)");
                            let _ = respond_to.send(removed);
                        }

                        AlertCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!("alert actor stopped");
    }

    /// One evaluation: threshold, trend and weather inline, prediction detached
    async fn run_cycle(&mut self) -> Vec<Alert> {
        let profile = self.deps.profile.current().await;

        let readings = match self.deps.store.latest(self.settings.window).await {
            Ok(readings) => readings,
            Err(e) => {
                warn!("failed to load readings for evaluation: {e}");
                Vec::new()
            }
        };

        let alerts = self.engine.evaluate(&profile, &readings).await;
        if !alerts.is_empty() {
            self.publish(EventType::NewAlerts, alerts_value(&alerts)).await;
        }

        self.spawn_prediction(profile, readings);
        alerts
    }

    fn spawn_prediction(&self, profile: SpeciesProfile, readings: Vec<Reading>) {
        let Some(advisor) = self.deps.advisor.clone() else {
            return;
        };

        if readings.len() < MIN_PREDICTION_READINGS {
            trace!("skipping prediction, only {} readings", readings.len());
            return;
        }

        let tx = self.prediction_tx.clone();
        let timeout = self.settings.predictive_timeout;
        let now = self.engine.now();

        tokio::spawn(async move {
            if let Some(alert) =
                engine::predict(advisor.as_ref(), &profile, &readings, timeout, now).await
            {
                let _ = tx.send(alert);
            }
        });
    }

    async fn handle_prediction(&mut self, alert: Alert) {
        debug!("merging prediction '{}'", alert.title);
        self.engine.record(std::slice::from_ref(&alert));

        let analysis = json!({
            "alertId": alert.id,
            "analysis": alert.message,
            "timestamp": alert.timestamp,
        });

        self.publish(EventType::NewAlerts, alerts_value(std::slice::from_ref(&alert)))
            .await;
        self.publish(EventType::AiAnalysis, analysis).await;
    }

    async fn publish(&self, kind: EventType, data: Value) {
        if let Err(e) = self.deps.hub.publish(kind, data).await {
            warn!("failed to publish {kind:?}: {e:#}");
        }
    }
}

fn alerts_value(alerts: &[Alert]) -> Value {
    serde_json::to_value(alerts).unwrap_or_else(|e| {
        warn!("failed to serialize alerts: {e}");
        Value::Array(Vec::new())
    })
}

/// Handle for controlling an AlertActor
#[derive(Clone)]
pub struct AlertHandle {
    sender: mpsc::Sender<AlertCommand>,
}

impl AlertHandle {
    pub fn spawn(engine: AlertEngine, deps: AlertDeps, settings: AlertSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = AlertActor::new(engine, deps, settings, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run an evaluation cycle immediately and return the new alerts
    pub async fn evaluate_now(&self) -> Result<Vec<Alert>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::EvaluateNow { respond_to: tx })
            .await
            .context("failed to send EvaluateNow command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Alert>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::Recent {
                limit,
                respond_to: tx,
            })
            .await
            .context("failed to send Recent command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn by_category(&self, category: AlertCategory) -> Result<Vec<Alert>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::ByCategory {
                category,
                respond_to: tx,
            })
            .await
            .context("failed to send ByCategory command")?;

        rx.await.context("failed to receive response")
    }

    /// Clear the history, returning how many alerts were removed
    pub async fn clear(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::Clear { respond_to: tx })
            .await
            .context("failed to send Clear command")?;

        rx.await.context("failed to receive response")
    }

    /// Gracefully shut down the alert actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(AlertCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}

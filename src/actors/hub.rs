//! HubActor - Owns the subscriber set and fans events out
//!
//! Subscribers are kept in registration order. Each one gets its own
//! heartbeat task which stops by itself as soon as the connection is no
//! longer writable.
//!
//! ```text
//! connect ──► Register ──► connection_established
//!                  └────► heartbeat task (every N seconds)
//! frame   ──► Incoming ──► ping → pong, subscribe → subscription_confirmed
//! publish ──► Broadcast ──► every open subscriber, failures isolated
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, instrument, trace, warn};

use crate::hub::{ClientMessage, Envelope, EventType, Inbound, SubscriberSink, Topic};

use super::messages::HubCommand;

struct Subscriber {
    sink: Arc<dyn SubscriberSink>,
    topics: HashSet<Topic>,
    heartbeat: JoinHandle<()>,
}

impl Subscriber {
    fn wants(&self, kind: EventType, filter_by_topic: bool) -> bool {
        if !filter_by_topic || self.topics.is_empty() {
            return true;
        }
        kind.topic().is_none_or(|topic| self.topics.contains(&topic))
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.heartbeat.abort();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HubSettings {
    pub heartbeat: Duration,
    pub filter_by_topic: bool,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(30),
            filter_by_topic: false,
        }
    }
}

impl From<&crate::config::HubConfig> for HubSettings {
    fn from(config: &crate::config::HubConfig) -> Self {
        Self {
            heartbeat: config.heartbeat(),
            filter_by_topic: config.filter_by_topic,
        }
    }
}

pub struct HubActor {
    subscribers: BTreeMap<u64, Subscriber>,
    next_id: u64,
    settings: HubSettings,
    command_rx: mpsc::Receiver<HubCommand>,
}

fn encode(envelope: &Envelope) -> Option<String> {
    match serde_json::to_string(envelope) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("failed to serialize {:?} event: {e}", envelope.kind);
            None
        }
    }
}

fn spawn_heartbeat(id: u64, sink: Arc<dyn SubscriberSink>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            ticker.tick().await;

            if !sink.is_open() {
                break;
            }

            let Some(text) = encode(&Envelope::new(EventType::Heartbeat, Value::Null).stamped())
            else {
                break;
            };

            if sink.send_text(&text).is_err() {
                break;
            }
        }

        trace!("heartbeat for subscriber {id} stopped");
    })
}

impl HubActor {
    pub fn new(settings: HubSettings, command_rx: mpsc::Receiver<HubCommand>) -> Self {
        Self {
            subscribers: BTreeMap::new(),
            next_id: 1,
            settings,
            command_rx,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting hub actor");

        loop {
            let Some(cmd) = self.command_rx.recv().await else {
                warn!("command channel closed, shutting down");
                break;
            };

            match cmd {
                HubCommand::Register { sink, respond_to } => {
                    let id = self.register(sink);
                    let _ = respond_to.send(id);
                }

                HubCommand::Unregister { id } => {
                    if self.subscribers.remove(&id).is_some() {
                        info!("subscriber {id} disconnected, {} remaining", self.subscribers.len());
                    }
                }

                HubCommand::Incoming { id, text } => self.handle_incoming(id, &text),

                HubCommand::Broadcast {
                    envelope,
                    respond_to,
                } => {
                    let delivered = self.broadcast(envelope);
                    if let Some(respond_to) = respond_to {
                        let _ = respond_to.send(delivered);
                    }
                }

                HubCommand::SubscriberCount { respond_to } => {
                    self.prune();
                    let _ = respond_to.send(self.subscribers.len());
                }

                HubCommand::Shutdown => {
                    debug!("received shutdown command");
                    break;
                }
            }
        }

        self.subscribers.clear();
        debug!("hub actor stopped");
    }

    fn register(&mut self, sink: Arc<dyn SubscriberSink>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let welcome = Envelope::new(
            EventType::ConnectionEstablished,
            json!({
                "clientId": id,
                "message": "Connected to greenhouse telemetry",
            }),
        )
        .stamped();

        if let Some(text) = encode(&welcome)
            && let Err(e) = sink.send_text(&text)
        {
            debug!("subscriber {id} went away before the welcome: {e}");
            return id;
        }

        let heartbeat = spawn_heartbeat(id, sink.clone(), self.settings.heartbeat);
        self.subscribers.insert(
            id,
            Subscriber {
                sink,
                topics: HashSet::new(),
                heartbeat,
            },
        );

        info!("subscriber {id} connected, {} total", self.subscribers.len());
        id
    }

    fn handle_incoming(&mut self, id: u64, text: &str) {
        let Some(subscriber) = self.subscribers.get_mut(&id) else {
            trace!("message from unknown subscriber {id}");
            return;
        };

        let message = match Inbound::parse(text) {
            Ok(Inbound::Known(message)) => message,
            Ok(Inbound::Unrecognized { kind }) => {
                debug!("ignoring '{kind}' message from subscriber {id}");
                return;
            }
            Err(e) => {
                debug!("ignoring message from subscriber {id}: {e}");
                return;
            }
        };

        let reply = match message {
            ClientMessage::Ping => Envelope::new(EventType::Pong, Value::Null),
            ClientMessage::Subscribe(topic) => {
                subscriber.topics.insert(topic);
                subscription_confirmed(topic, true)
            }
            ClientMessage::Unsubscribe(topic) => {
                subscriber.topics.remove(&topic);
                subscription_confirmed(topic, false)
            }
        };

        if let Some(text) = encode(&reply.stamped())
            && let Err(e) = subscriber.sink.send_text(&text)
        {
            debug!("failed to reply to subscriber {id}: {e}");
        }
    }

    /// Deliver to every open subscriber, returning how many got it
    fn broadcast(&mut self, envelope: Envelope) -> usize {
        let envelope = envelope.stamped();
        let Some(text) = encode(&envelope) else {
            return 0;
        };

        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, subscriber) in &self.subscribers {
            if !subscriber.wants(envelope.kind, self.settings.filter_by_topic) {
                continue;
            }

            match subscriber.sink.send_text(&text) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!("delivery to subscriber {id} failed: {e}");
                    failed.push(*id);
                }
            }
        }

        for id in failed {
            self.subscribers.remove(&id);
        }
        self.prune();

        trace!("{:?} delivered to {delivered} subscribers", envelope.kind);
        delivered
    }

    fn prune(&mut self) {
        let before = self.subscribers.len();
        self.subscribers.retain(|_, subscriber| subscriber.sink.is_open());

        let pruned = before - self.subscribers.len();
        if pruned > 0 {
            debug!("pruned {pruned} closed subscribers");
        }
    }
}

fn subscription_confirmed(topic: Topic, subscribed: bool) -> Envelope {
    Envelope::new(
        EventType::SubscriptionConfirmed,
        json!({ "topic": topic, "subscribed": subscribed }),
    )
}

/// Handle for controlling a HubActor
#[derive(Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    pub fn spawn(settings: HubSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);

        let actor = HubActor::new(settings, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Register a new subscriber connection and return its id
    pub async fn connect(&self, sink: Arc<dyn SubscriberSink>) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Register {
                sink,
                respond_to: tx,
            })
            .await
            .context("failed to send Register command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn disconnect(&self, id: u64) -> Result<()> {
        self.sender
            .send(HubCommand::Unregister { id })
            .await
            .context("failed to send Unregister command")?;
        Ok(())
    }

    /// Pass a text frame received from subscriber `id` to the hub
    pub async fn incoming(&self, id: u64, text: String) -> Result<()> {
        self.sender
            .send(HubCommand::Incoming { id, text })
            .await
            .context("failed to send Incoming command")?;
        Ok(())
    }

    /// Broadcast and wait for the number of subscribers reached
    pub async fn broadcast(&self, envelope: Envelope) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Broadcast {
                envelope,
                respond_to: Some(tx),
            })
            .await
            .context("failed to send Broadcast command")?;

        rx.await.context("failed to receive response")
    }

    /// Fire-and-forget broadcast
    pub async fn publish(&self, kind: EventType, data: Value) -> Result<()> {
        self.sender
            .send(HubCommand::Broadcast {
                envelope: Envelope::new(kind, data),
                respond_to: None,
            })
            .await
            .context("failed to send Broadcast command")?;
        Ok(())
    }

    pub async fn subscriber_count(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HubCommand::SubscriberCount { respond_to: tx })
            .await
            .context("failed to send SubscriberCount command")?;

        rx.await.context("failed to receive response")
    }

    /// Gracefully shut down the hub actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(HubCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}

//! WebSocket driver for the connection state machine

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, instrument, trace, warn};

use super::machine::{Action, ConnectionMachine, ConnectionState, ReconnectPolicy, TransportEvent};
use crate::hub::{ClientMessage, Envelope, EventType, Topic};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Callback for a received envelope
pub type Handler = Arc<dyn Fn(&Envelope) + Send + Sync>;

#[derive(Debug)]
enum ConnectorCommand {
    Send {
        message: ClientMessage,
        respond_to: oneshot::Sender<bool>,
    },
    Reset,
    Close,
}

/// Configures and spawns a connector
pub struct ConnectorBuilder {
    url: String,
    policy: ReconnectPolicy,
    keep_alive: Duration,
    connect_timeout: Duration,
    handlers: HashMap<EventType, Vec<Handler>>,
    fallback: Vec<Handler>,
    topics: Vec<Topic>,
}

impl ConnectorBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            policy: ReconnectPolicy::default(),
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            handlers: HashMap::new(),
            fallback: Vec::new(),
            topics: Vec::new(),
        }
    }

    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    /// Give up on a TCP connect or WebSocket handshake after `timeout`;
    /// counts as a failed attempt
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Register a handler for one event type
    pub fn on<F>(mut self, kind: EventType, handler: F) -> Self
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.handlers.entry(kind).or_default().push(Arc::new(handler));
        self
    }

    /// Register a handler that sees every event
    pub fn on_any<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.fallback.push(Arc::new(handler));
        self
    }

    /// Declare interest in a topic; re-sent after every (re)connect
    pub fn subscribe(mut self, topic: Topic) -> Self {
        if !self.topics.contains(&topic) {
            self.topics.push(topic);
        }
        self
    }

    pub fn spawn(self) -> ConnectorHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let driver = ConnectorDriver {
            url: self.url,
            keep_alive: self.keep_alive,
            connect_timeout: self.connect_timeout,
            handlers: self.handlers,
            fallback: self.fallback,
            topics: self.topics,
            machine: ConnectionMachine::new(self.policy),
            state_tx,
            command_rx: cmd_rx,
        };
        tokio::spawn(driver.run());

        ConnectorHandle {
            sender: cmd_tx,
            state: state_rx,
        }
    }
}

struct ConnectorDriver {
    url: String,
    keep_alive: Duration,
    connect_timeout: Duration,
    handlers: HashMap<EventType, Vec<Handler>>,
    fallback: Vec<Handler>,
    topics: Vec<Topic>,
    machine: ConnectionMachine,
    state_tx: watch::Sender<ConnectionState>,
    command_rx: mpsc::Receiver<ConnectorCommand>,
}

impl ConnectorDriver {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn run(mut self) {
        debug!("starting connector");

        loop {
            let ended_by = self.session().await;

            match self.apply(ended_by) {
                Action::Reconnect { attempt, delay } => {
                    info!("reconnecting in {delay:?} (attempt {})", attempt + 1);
                    if !self.backoff(delay).await {
                        break;
                    }
                }

                Action::GiveUp => {
                    warn!(
                        "giving up after {} attempts",
                        self.machine.policy().max_attempts
                    );
                    if !self.idle().await {
                        break;
                    }
                }

                Action::StopTimers if ended_by == TransportEvent::ManualClose => break,

                Action::StopTimers => {
                    info!("server closed the connection");
                    if !self.idle().await {
                        break;
                    }
                }

                Action::StartKeepAlive | Action::Ignore => {}
            }
        }

        debug!("connector stopped");
    }

    fn apply(&mut self, event: TransportEvent) -> Action {
        let action = self.machine.on_event(event);
        trace!("{event:?} -> {:?} ({action:?})", self.machine.state());
        self.state_tx.send_replace(self.machine.state());
        action
    }

    /// Connect and serve until the transport ends, returning how it ended
    async fn session(&mut self) -> TransportEvent {
        let handshake = time::timeout(self.connect_timeout, connect_async(self.url.clone()));
        tokio::pin!(handshake);

        let socket = loop {
            tokio::select! {
                result = &mut handshake => match result {
                    Ok(Ok((socket, _))) => break socket,
                    Ok(Err(e)) => {
                        warn!("connection failed: {e}");
                        return TransportEvent::Failed;
                    }
                    Err(_) => {
                        warn!("handshake timed out after {:?}", self.connect_timeout);
                        return TransportEvent::Failed;
                    }
                },

                cmd = self.command_rx.recv() => {
                    if let Some(ended) = handle_connecting(cmd) {
                        return ended;
                    }
                }
            }
        };

        self.apply(TransportEvent::Opened);
        info!("connected");

        let (mut write, mut read) = socket.split();

        for topic in self.topics.clone() {
            if let Err(e) = send_message(&mut write, ClientMessage::Subscribe(topic)).await {
                warn!("failed to subscribe to {topic:?}: {e}");
                return TransportEvent::Failed;
            }
        }

        self.serve(&mut write, &mut read).await
    }

    async fn serve(
        &mut self,
        write: &mut SplitSink<Socket, Message>,
        read: &mut SplitStream<Socket>,
    ) -> TransportEvent {
        let mut ping = time::interval_at(Instant::now() + self.keep_alive, self.keep_alive);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ping.tick() => {
                    if let Err(e) = send_message(write, ClientMessage::Ping).await {
                        warn!("keep-alive failed: {e}");
                        return TransportEvent::Failed;
                    }
                }

                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.dispatch(&text),
                        Some(Ok(Message::Close(frame))) => {
                            let code = frame.map(|f| u16::from(f.code));
                            debug!("close frame received: {code:?}");
                            return TransportEvent::Closed { code };
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("transport error: {e}");
                            return TransportEvent::Failed;
                        }
                        None => return TransportEvent::Closed { code: None },
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(ConnectorCommand::Send { message, respond_to }) => {
                            let sent = match send_message(write, message).await {
                                Ok(()) => true,
                                Err(e) => {
                                    warn!("failed to send {message:?}: {e}");
                                    false
                                }
                            };
                            let _ = respond_to.send(sent);
                        }

                        Some(ConnectorCommand::Reset) => {}

                        Some(ConnectorCommand::Close) | None => {
                            let frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: "".into(),
                            };
                            let _ = write.send(Message::Close(Some(frame))).await;
                            return TransportEvent::ManualClose;
                        }
                    }
                }
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("dropping unparseable event: {e}");
                return;
            }
        };

        trace!("received {:?}", envelope.kind);

        if let Some(handlers) = self.handlers.get(&envelope.kind) {
            for handler in handlers {
                handler(&envelope);
            }
        }
        for handler in &self.fallback {
            handler(&envelope);
        }
    }

    /// Wait out a reconnect delay; `false` if the connector was closed meanwhile
    async fn backoff(&mut self, delay: Duration) -> bool {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,

                cmd = self.command_rx.recv() => {
                    if let Some(keep_going) = self.handle_offline(cmd) {
                        return keep_going;
                    }
                }
            }
        }
    }

    /// Park in a terminal state until reset or closed
    async fn idle(&mut self) -> bool {
        loop {
            let cmd = self.command_rx.recv().await;
            if let Some(keep_going) = self.handle_offline(cmd) {
                return keep_going;
            }
        }
    }

    /// Commands while not connected; `Some` ends the wait
    fn handle_offline(&mut self, cmd: Option<ConnectorCommand>) -> Option<bool> {
        match cmd {
            Some(ConnectorCommand::Send { message, respond_to }) => {
                debug!("not connected, dropping {message:?}");
                let _ = respond_to.send(false);
                None
            }

            Some(ConnectorCommand::Reset) => {
                self.machine.reset();
                self.state_tx.send_replace(self.machine.state());
                info!("connector reset");
                Some(true)
            }

            Some(ConnectorCommand::Close) | None => {
                self.apply(TransportEvent::ManualClose);
                Some(false)
            }
        }
    }
}

/// Commands while a handshake is in flight; `Some` aborts it
fn handle_connecting(cmd: Option<ConnectorCommand>) -> Option<TransportEvent> {
    match cmd {
        Some(ConnectorCommand::Send { message, respond_to }) => {
            debug!("still connecting, dropping {message:?}");
            let _ = respond_to.send(false);
            None
        }

        // already on a fresh attempt
        Some(ConnectorCommand::Reset) => None,

        Some(ConnectorCommand::Close) | None => Some(TransportEvent::ManualClose),
    }
}

async fn send_message(
    write: &mut SplitSink<Socket, Message>,
    message: ClientMessage,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    write.send(Message::Text(message.to_value().to_string())).await
}

/// Handle for controlling a running connector
#[derive(Clone)]
pub struct ConnectorHandle {
    sender: mpsc::Sender<ConnectorCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectorHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the connector reaches a state matching `predicate`
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&ConnectionState) -> bool,
    ) -> Result<ConnectionState> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(predicate)
            .await
            .context("connector stopped")?;
        Ok(*state)
    }

    /// Send a message to the hub; `false` if it was dropped because the
    /// connection is not open
    pub async fn send(&self, message: ClientMessage) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ConnectorCommand::Send {
                message,
                respond_to: tx,
            })
            .await
            .context("failed to send Send command")?;

        rx.await.context("failed to receive response")
    }

    /// Leave a terminal state and reconnect with a fresh attempt budget
    pub async fn reset(&self) -> Result<()> {
        self.sender
            .send(ConnectorCommand::Reset)
            .await
            .context("failed to send Reset command")?;
        Ok(())
    }

    /// Tear the connection down; never followed by a reconnect
    pub async fn close(&self) -> Result<()> {
        self.sender
            .send(ConnectorCommand::Close)
            .await
            .context("failed to send Close command")?;
        Ok(())
    }
}

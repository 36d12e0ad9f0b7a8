//! Reconnection state machine
//!
//! Pure `(state, event) -> action` transitions, no timers or sockets. The
//! driver in [`super::client`] turns actions into sleeps and reconnects.
//!
//! ```text
//!              Opened                 Closed(1000)
//! Connecting ─────────► Open ─────────────────────► Closed
//!     ▲  │                │
//!     │  │ attempts       │ abnormal close / error
//!     │  │ exhausted      ▼
//!     │  └──────► PermanentlyFailed ◄── (attempts >= max)
//!     └──────── Reconnect { delay } ◄──┘
//! ```

use std::time::Duration;

use serde::Serialize;

/// WebSocket close code for a clean shutdown
pub const NORMAL_CLOSURE: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    PermanentlyFailed,
}

impl ConnectionState {
    /// No further transport activity will happen without a reset
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::PermanentlyFailed)
    }
}

/// Lifecycle callback from the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Closed { code: Option<u16> },
    Failed,
    /// Teardown requested by the owner of the connector
    ManualClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartKeepAlive,
    Reconnect { attempt: u32, delay: Duration },
    StopTimers,
    GiveUp,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^attempt, cap)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Connecting,
            attempts: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn on_event(&mut self, event: TransportEvent) -> Action {
        use ConnectionState::*;

        match (self.state, event) {
            (PermanentlyFailed, _) => Action::Ignore,

            (_, TransportEvent::ManualClose) => {
                self.state = Closed;
                Action::StopTimers
            }

            (Closed, _) => Action::Ignore,

            (Connecting, TransportEvent::Opened) => {
                self.state = Open;
                self.attempts = 0;
                Action::StartKeepAlive
            }

            (Open, TransportEvent::Opened) => Action::Ignore,

            (Open, TransportEvent::Closed { code: Some(NORMAL_CLOSURE) }) => {
                self.state = Closed;
                Action::StopTimers
            }

            (Open | Connecting, TransportEvent::Closed { .. } | TransportEvent::Failed) => {
                self.schedule_reconnect()
            }
        }
    }

    fn schedule_reconnect(&mut self) -> Action {
        if self.attempts >= self.policy.max_attempts {
            self.state = ConnectionState::PermanentlyFailed;
            return Action::GiveUp;
        }

        let attempt = self.attempts;
        self.attempts += 1;
        self.state = ConnectionState::Connecting;

        Action::Reconnect {
            attempt,
            delay: self.policy.delay_for(attempt),
        }
    }

    /// Leave any terminal state and start over with a fresh attempt budget
    pub fn reset(&mut self) {
        self.state = ConnectionState::Connecting;
        self.attempts = 0;
    }
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

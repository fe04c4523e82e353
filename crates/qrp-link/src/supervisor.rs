//! Link supervision
//!
//! Tracks the serial link through connect, loss, and recovery. Losses
//! schedule reconnect attempts on an exponential ladder with jitter; a
//! loss that lands mid-transmission gets one immediate attempt first,
//! since the operator is actively keyed and every second counts. Once
//! the retry budget is spent the supervisor parks in `Failed` and waits
//! for a hardware probe to re-arm it.
//!
//! The supervisor is pure bookkeeping: it decides what to do next and
//! records events, while the bridge actor performs the actual opens,
//! handshakes, and timers.

use std::time::{Duration, SystemTime};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::LinkEvent;

/// Link lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No link and no attempt in progress
    #[default]
    Disconnected,
    /// Initial connect in progress
    Connecting,
    /// Link open and handshake verified
    Connected,
    /// Link lost, retry ladder running
    Reconnecting,
    /// Retry budget spent, waiting for the hardware to reappear
    Failed,
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Reconnecting => "Reconnecting",
            Self::Failed => "Failed",
        }
    }
}

/// Supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// First rung of the retry ladder (ms)
    pub base_delay_ms: u64,
    /// Ceiling for the retry ladder (ms)
    pub max_delay_ms: u64,
    /// Failed attempts before giving up
    pub max_retries: u32,
    /// Silence on the link before it is declared dead (ms)
    pub quiet_timeout_ms: u64,
    /// Budget for opening the port (ms)
    pub connect_timeout_ms: u64,
    /// Budget for the identify handshake after open (ms)
    pub handshake_timeout_ms: u64,
    /// Hardware probe interval while in `Failed` (ms)
    pub probe_interval_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            max_retries: 6,
            quiet_timeout_ms: 10_000,
            connect_timeout_ms: 3_000,
            handshake_timeout_ms: 2_000,
            probe_interval_ms: 5_000,
        }
    }
}

/// What the caller should do after reporting a loss or a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDirective {
    /// Attempt right away
    AttemptNow,
    /// Attempt after the given delay
    AttemptAfter(Duration),
    /// Budget spent; wait for a hardware probe
    GiveUp,
}

/// Retry delay for the given ladder rung, before jitter
pub fn ladder_delay_ms(config: &SupervisorConfig, exp: u32) -> u64 {
    config
        .base_delay_ms
        .saturating_mul(1u64 << exp.min(16))
        .min(config.max_delay_ms)
}

/// Spread a delay by +/-10% so bridges sharing a bus do not retry in
/// lockstep
fn with_jitter(ms: u64) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.9..=1.1);
    Duration::from_millis((ms as f64 * factor).round() as u64)
}

/// Connection lifecycle bookkeeping for one radio link
#[derive(Debug)]
pub struct LinkSupervisor {
    config: SupervisorConfig,
    state: ConnectionState,
    retries: u32,
    backoff_exp: u32,
    tx_dropped: bool,
    events: Vec<LinkEvent>,
}

impl LinkSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            retries: 0,
            backoff_exp: 0,
            tx_dropped: false,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Whether the current outage began mid-transmission
    pub fn tx_dropped(&self) -> bool {
        self.tx_dropped
    }

    /// Failed attempts in the current outage
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Take all events recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<LinkEvent> {
        std::mem::take(&mut self.events)
    }

    fn set_state(&mut self, to: ConnectionState) {
        if self.state == to {
            return;
        }
        info!("link {} -> {}", self.state.name(), to.name());
        self.events.push(LinkEvent::StateChanged {
            from: self.state,
            to,
            retries: self.retries,
            timestamp: SystemTime::now(),
        });
        self.state = to;
    }

    /// The initial connect is starting
    pub fn begin_connect(&mut self) {
        self.set_state(ConnectionState::Connecting);
    }

    /// The port opened and the identify handshake checked out
    pub fn connection_established(&mut self) {
        if self.state == ConnectionState::Reconnecting {
            self.events.push(LinkEvent::ReconnectSucceeded {
                attempts: self.retries + 1,
                timestamp: SystemTime::now(),
            });
        }
        self.retries = 0;
        self.backoff_exp = 0;
        self.tx_dropped = false;
        self.set_state(ConnectionState::Connected);
    }

    /// An established link went away
    ///
    /// `transmitting` selects the fast path: a drop mid-transmission is
    /// retried immediately, and the ladder only starts if that attempt
    /// fails.
    pub fn connection_lost(&mut self, reason: &str, transmitting: bool) -> ReconnectDirective {
        warn!("link lost: {reason}");
        self.retries = 0;
        self.backoff_exp = 0;
        self.set_state(ConnectionState::Reconnecting);

        if transmitting {
            self.tx_dropped = true;
            self.events.push(LinkEvent::TxDropDetected {
                timestamp: SystemTime::now(),
            });
            self.events.push(LinkEvent::ReconnectStarted {
                attempt: 1,
                delay: Duration::ZERO,
                timestamp: SystemTime::now(),
            });
            return ReconnectDirective::AttemptNow;
        }

        let delay = with_jitter(ladder_delay_ms(&self.config, self.backoff_exp));
        self.backoff_exp += 1;
        self.events.push(LinkEvent::ReconnectStarted {
            attempt: 1,
            delay,
            timestamp: SystemTime::now(),
        });
        ReconnectDirective::AttemptAfter(delay)
    }

    /// A connect or reconnect attempt failed
    pub fn attempt_failed(&mut self, error: &str) -> ReconnectDirective {
        self.retries += 1;
        debug!("attempt {} failed: {error}", self.retries);
        self.events.push(LinkEvent::ReconnectFailed {
            attempt: self.retries,
            error: error.to_string(),
            timestamp: SystemTime::now(),
        });

        if self.retries >= self.config.max_retries {
            warn!("giving up after {} attempts", self.retries);
            self.events.push(LinkEvent::RetriesExhausted {
                attempts: self.retries,
                timestamp: SystemTime::now(),
            });
            self.set_state(ConnectionState::Failed);
            return ReconnectDirective::GiveUp;
        }

        // an initial-connect failure joins the same ladder
        self.set_state(ConnectionState::Reconnecting);

        let delay = with_jitter(ladder_delay_ms(&self.config, self.backoff_exp));
        self.backoff_exp += 1;
        self.events.push(LinkEvent::ReconnectStarted {
            attempt: self.retries + 1,
            delay,
            timestamp: SystemTime::now(),
        });
        ReconnectDirective::AttemptAfter(delay)
    }

    /// A probe found the hardware again while in `Failed`
    pub fn hardware_detected(&mut self) -> ReconnectDirective {
        info!("hardware detected, re-arming reconnect");
        self.retries = 0;
        self.backoff_exp = 0;
        self.set_state(ConnectionState::Reconnecting);
        self.events.push(LinkEvent::ReconnectStarted {
            attempt: 1,
            delay: Duration::ZERO,
            timestamp: SystemTime::now(),
        });
        ReconnectDirective::AttemptNow
    }
}

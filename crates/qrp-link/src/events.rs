//! Unified event stream for the bridge
//!
//! All bridge activity (link lifecycle, reconnection progress, power
//! alarms, client sessions) is emitted through a single event channel,
//! so observers like the daemon log writer see one consistently ordered
//! stream.

use std::time::{Duration, SystemTime};

use crate::supervisor::ConnectionState;

/// Unified event enum for all bridge activity
#[derive(Debug, Clone)]
pub enum LinkEvent {
    // -------------------------------------------------------------------------
    // Link lifecycle events
    // -------------------------------------------------------------------------
    /// The link moved between lifecycle states
    StateChanged {
        /// Previous state
        from: ConnectionState,
        /// New state
        to: ConnectionState,
        /// Failed attempts in the current outage
        retries: u32,
        /// When the transition happened
        timestamp: SystemTime,
    },

    /// The link dropped while the radio was keyed
    TxDropDetected {
        /// When the drop was noticed
        timestamp: SystemTime,
    },

    // -------------------------------------------------------------------------
    // Reconnection events
    // -------------------------------------------------------------------------
    /// A reconnect attempt was scheduled
    ReconnectStarted {
        /// Attempt number within this outage, starting at 1
        attempt: u32,
        /// Delay before the attempt runs (zero for the fast path)
        delay: Duration,
        /// When the attempt was scheduled
        timestamp: SystemTime,
    },

    /// A reconnect attempt failed
    ReconnectFailed {
        /// Attempt number within this outage
        attempt: u32,
        /// Why it failed
        error: String,
        /// When it failed
        timestamp: SystemTime,
    },

    /// The link came back
    ReconnectSucceeded {
        /// Attempts it took, including the successful one
        attempts: u32,
        /// When the link came back
        timestamp: SystemTime,
    },

    /// The retry budget was spent without recovering the link
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// When the supervisor gave up
        timestamp: SystemTime,
    },

    // -------------------------------------------------------------------------
    // Power events
    // -------------------------------------------------------------------------
    /// Zero forward power was read during transmit
    PowerWarning {
        /// The reading in watts
        watts: f32,
        /// Consecutive zero readings so far
        consecutive: u32,
        /// When the reading was taken
        timestamp: SystemTime,
    },

    /// Sustained zero forward power forced a reconnect cycle
    PowerCritical {
        /// Consecutive zero readings that triggered the escalation
        consecutive: u32,
        /// When the escalation fired
        timestamp: SystemTime,
    },

    // -------------------------------------------------------------------------
    // Client session events
    // -------------------------------------------------------------------------
    /// A control client attached to the bridge
    ClientConnected {
        /// Peer description, typically a socket address
        peer: String,
        /// When it attached
        timestamp: SystemTime,
    },

    /// The control client went away
    ClientDisconnected {
        /// When it detached
        timestamp: SystemTime,
    },
}

impl LinkEvent {
    /// When the event happened
    pub fn timestamp(&self) -> SystemTime {
        match self {
            LinkEvent::StateChanged { timestamp, .. }
            | LinkEvent::TxDropDetected { timestamp }
            | LinkEvent::ReconnectStarted { timestamp, .. }
            | LinkEvent::ReconnectFailed { timestamp, .. }
            | LinkEvent::ReconnectSucceeded { timestamp, .. }
            | LinkEvent::RetriesExhausted { timestamp, .. }
            | LinkEvent::PowerWarning { timestamp, .. }
            | LinkEvent::PowerCritical { timestamp, .. }
            | LinkEvent::ClientConnected { timestamp, .. }
            | LinkEvent::ClientDisconnected { timestamp } => *timestamp,
        }
    }

    /// Check if this event signals trouble worth surfacing to the operator
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            LinkEvent::TxDropDetected { .. }
                | LinkEvent::ReconnectFailed { .. }
                | LinkEvent::RetriesExhausted { .. }
                | LinkEvent::PowerWarning { .. }
                | LinkEvent::PowerCritical { .. }
        )
    }

    /// Check if this is a link lifecycle event
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            LinkEvent::StateChanged { .. }
                | LinkEvent::ReconnectStarted { .. }
                | LinkEvent::ReconnectSucceeded { .. }
                | LinkEvent::RetriesExhausted { .. }
        )
    }

    /// One-line description for the daemon log
    pub fn summary(&self) -> String {
        match self {
            LinkEvent::StateChanged { from, to, .. } => {
                format!("link {} -> {}", from.name(), to.name())
            }
            LinkEvent::TxDropDetected { .. } => "link dropped mid-transmission".to_string(),
            LinkEvent::ReconnectStarted { attempt, delay, .. } => {
                format!("reconnect attempt {attempt} in {delay:?}")
            }
            LinkEvent::ReconnectFailed { attempt, error, .. } => {
                format!("reconnect attempt {attempt} failed: {error}")
            }
            LinkEvent::ReconnectSucceeded { attempts, .. } => {
                format!("link recovered after {attempts} attempt(s)")
            }
            LinkEvent::RetriesExhausted { attempts, .. } => {
                format!("link unrecoverable after {attempts} attempt(s)")
            }
            LinkEvent::PowerWarning {
                watts, consecutive, ..
            } => {
                format!("zero forward power ({watts:.1} W, {consecutive} in a row)")
            }
            LinkEvent::PowerCritical { consecutive, .. } => {
                format!("sustained zero forward power ({consecutive} readings), recycling link")
            }
            LinkEvent::ClientConnected { peer, .. } => format!("client connected from {peer}"),
            LinkEvent::ClientDisconnected { .. } => "client disconnected".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classification() {
        let drop = LinkEvent::TxDropDetected {
            timestamp: SystemTime::now(),
        };
        assert!(drop.is_fault());

        let recovered = LinkEvent::ReconnectSucceeded {
            attempts: 2,
            timestamp: SystemTime::now(),
        };
        assert!(!recovered.is_fault());
        assert!(recovered.is_lifecycle());

        let warning = LinkEvent::PowerWarning {
            watts: 0.0,
            consecutive: 1,
            timestamp: SystemTime::now(),
        };
        assert!(warning.is_fault());
        assert!(!warning.is_lifecycle());
    }

    #[test]
    fn test_summaries_name_the_states() {
        let event = LinkEvent::StateChanged {
            from: ConnectionState::Connected,
            to: ConnectionState::Reconnecting,
            retries: 0,
            timestamp: SystemTime::now(),
        };
        assert_eq!(event.summary(), "link Connected -> Reconnecting");
    }
}

//! Forward power monitor
//!
//! While the bridge is connected it polls the meter on a fixed interval.
//! A reading at or below the zero threshold during transmit means the RF
//! path is dead even though the serial link still answers, so a run of
//! them escalates to a critical that forces a reconnect cycle. The
//! monitor here classifies readings; the bridge actor does the polling
//! and acts on the classification.

use std::collections::VecDeque;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Power monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerMonitorConfig {
    /// Meter poll interval while connected (ms)
    pub poll_interval_ms: u64,
    /// Readings at or below this count as zero output (watts)
    pub zero_threshold_watts: f32,
    /// Consecutive zero readings during transmit before escalating
    pub critical_after: u32,
    /// Readings kept for diagnostics
    pub history_len: usize,
}

impl Default for PowerMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            zero_threshold_watts: 0.5,
            critical_after: 3,
            history_len: 10,
        }
    }
}

/// Classification of one meter reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerClass {
    /// Output present, or not transmitting
    Normal,
    /// Zero output while transmitting
    Warning { watts: f32, consecutive: u32 },
    /// The consecutive-zero limit was reached; fires once per episode
    Critical { consecutive: u32 },
}

/// Tracks meter readings and escalates sustained zero output
#[derive(Debug)]
pub struct PowerMonitor {
    config: PowerMonitorConfig,
    history: VecDeque<(SystemTime, f32)>,
    consecutive_zero: u32,
    critical_latched: bool,
}

impl PowerMonitor {
    pub fn new(config: PowerMonitorConfig) -> Self {
        let history_len = config.history_len;
        Self {
            config,
            history: VecDeque::with_capacity(history_len),
            consecutive_zero: 0,
            critical_latched: false,
        }
    }

    /// Record one meter reading and classify it
    ///
    /// Zero readings only count against the limit while transmitting;
    /// idle readings leave the consecutive count untouched either way.
    /// Once the limit fires, further zeros classify as warnings until a
    /// non-zero reading clears the episode.
    pub fn record(&mut self, watts: f32, transmitting: bool) -> PowerClass {
        if self.history.len() == self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back((SystemTime::now(), watts));

        if !transmitting {
            return PowerClass::Normal;
        }

        if watts > self.config.zero_threshold_watts {
            self.consecutive_zero = 0;
            self.critical_latched = false;
            return PowerClass::Normal;
        }

        self.consecutive_zero += 1;
        if self.consecutive_zero >= self.config.critical_after && !self.critical_latched {
            self.critical_latched = true;
            return PowerClass::Critical {
                consecutive: self.consecutive_zero,
            };
        }

        PowerClass::Warning {
            watts,
            consecutive: self.consecutive_zero,
        }
    }

    /// Most recent reading, if any
    pub fn last_reading(&self) -> Option<(SystemTime, f32)> {
        self.history.back().copied()
    }

    /// Recent readings, oldest first
    pub fn history(&self) -> impl Iterator<Item = &(SystemTime, f32)> {
        self.history.iter()
    }

    /// Clear the zero-output episode (link was torn down or rebuilt)
    pub fn reset(&mut self) {
        self.consecutive_zero = 0;
        self.critical_latched = false;
    }
}

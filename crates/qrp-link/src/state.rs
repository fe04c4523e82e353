//! Shared radio state
//!
//! The single record of what the transceiver is believed to be doing.
//! The interpreter answers client queries from it, set commands and
//! hardware reports update it, and the keying sequencer owns the
//! `transmitting` flag.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use qrp_protocol::{OperatingMode, StatusReport, Vfo};

/// Current emulated state of the transceiver
#[derive(Debug, Clone, PartialEq)]
pub struct RadioState {
    /// VFO A frequency in Hz
    pub vfo_a_hz: u64,
    /// VFO B frequency in Hz
    pub vfo_b_hz: u64,
    /// Current operating mode
    pub mode: OperatingMode,
    /// Which VFO is selected
    pub active_vfo: Vfo,
    /// Keyed right now
    pub transmitting: bool,
    /// Push unsolicited status reports to the client
    pub auto_info: bool,
    /// Most recent forward power reading, `None` until the first sample
    pub last_power_watts: Option<f32>,
}

impl Default for RadioState {
    fn default() -> Self {
        // Startup fallbacks served until the hardware reports real
        // values: the FT8 dial frequencies on 20m and 40m, USB, VFO A.
        Self {
            vfo_a_hz: 14_074_000,
            vfo_b_hz: 7_074_000,
            mode: OperatingMode::Usb,
            active_vfo: Vfo::A,
            transmitting: false,
            auto_info: false,
            last_power_watts: None,
        }
    }
}

impl RadioState {
    /// Frequency of the selected VFO
    pub fn active_frequency_hz(&self) -> u64 {
        match self.active_vfo {
            Vfo::A => self.vfo_a_hz,
            Vfo::B => self.vfo_b_hz,
        }
    }

    /// Snapshot for the composite status report
    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            frequency_hz: self.active_frequency_hz(),
            mode: self.mode,
            active_vfo: self.active_vfo,
            transmitting: self.transmitting,
        }
    }
}

/// Thread-safe handle to the shared radio state
///
/// Accessors take the lock for the duration of the call only; no caller
/// holds it across an await or blocking I/O. The `transmitting` setter is
/// crate-private: only the keying sequencer and the reconnect path flip it.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<RadioState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RadioState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Full copy of the current state
    pub fn snapshot(&self) -> RadioState {
        self.lock().clone()
    }

    pub fn vfo_frequency_hz(&self, vfo: Vfo) -> u64 {
        let state = self.lock();
        match vfo {
            Vfo::A => state.vfo_a_hz,
            Vfo::B => state.vfo_b_hz,
        }
    }

    pub fn set_vfo_frequency_hz(&self, vfo: Vfo, hz: u64) {
        let mut state = self.lock();
        match vfo {
            Vfo::A => state.vfo_a_hz = hz,
            Vfo::B => state.vfo_b_hz = hz,
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.lock().mode
    }

    pub fn set_mode(&self, mode: OperatingMode) {
        self.lock().mode = mode;
    }

    pub fn active_vfo(&self) -> Vfo {
        self.lock().active_vfo
    }

    pub fn set_active_vfo(&self, vfo: Vfo) {
        self.lock().active_vfo = vfo;
    }

    pub fn transmitting(&self) -> bool {
        self.lock().transmitting
    }

    pub(crate) fn set_transmitting(&self, on: bool) {
        self.lock().transmitting = on;
    }

    pub fn auto_info(&self) -> bool {
        self.lock().auto_info
    }

    pub fn set_auto_info(&self, on: bool) {
        self.lock().auto_info = on;
    }

    pub fn last_power_watts(&self) -> Option<f32> {
        self.lock().last_power_watts
    }

    pub(crate) fn set_last_power_watts(&self, watts: f32) {
        self.lock().last_power_watts = Some(watts);
    }

    /// Status snapshot for the composite report
    pub fn status_report(&self) -> StatusReport {
        self.lock().status_report()
    }
}

//! Virtual transceiver simulation
//!
//! Provides a simulated QRP transceiver that speaks the CAT command set
//! the bridge expects, so link logic can be exercised without hardware.
//! Incoming frames update state and queue protocol-accurate replies;
//! scripted setters model front-panel changes that emit unsolicited
//! reports when auto-information is enabled.

use std::collections::VecDeque;

use qrp_protocol::{parse_frame, response, CatCommand, OperatingMode, StatusReport, Vfo};
use serde::{Deserialize, Serialize};

/// A simulated transceiver that answers the bridge's CAT traffic
#[derive(Debug)]
pub struct VirtualTransceiver {
    /// Identification digits reported for `ID;`
    id: String,
    /// VFO A frequency in Hz
    vfo_a_hz: u64,
    /// VFO B frequency in Hz
    vfo_b_hz: u64,
    /// Current operating mode
    mode: OperatingMode,
    /// Which VFO is selected
    active_vfo: Vfo,
    /// Keyed state
    transmitting: bool,
    /// Serial audio path state
    audio_path: bool,
    /// Auto-information reporting enabled
    auto_info: bool,
    /// Forward power delivered while keyed, in watts
    power_watts: f32,
    /// When false the radio swallows all traffic without replying
    responding: bool,
    /// Pending output frames
    pending_output: VecDeque<Vec<u8>>,
    /// Frames received (for test verification)
    received_frames: Vec<Vec<u8>>,
}

/// Configuration for creating a virtual transceiver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualTransceiverConfig {
    /// Identification digits
    pub id: String,
    /// Initial VFO A frequency in Hz
    pub initial_vfo_a_hz: u64,
    /// Initial VFO B frequency in Hz
    pub initial_vfo_b_hz: u64,
    /// Initial operating mode
    pub initial_mode: OperatingMode,
    /// Forward power delivered while keyed, in watts
    pub power_watts: f32,
}

impl Default for VirtualTransceiverConfig {
    fn default() -> Self {
        Self {
            id: response::RADIO_ID.to_string(),
            initial_vfo_a_hz: 14_074_000, // 20m FT8
            initial_vfo_b_hz: 7_074_000,  // 40m FT8
            initial_mode: OperatingMode::Usb,
            power_watts: 5.0,
        }
    }
}

impl VirtualTransceiver {
    /// Create a virtual transceiver with default settings
    pub fn new() -> Self {
        Self::from_config(VirtualTransceiverConfig::default())
    }

    /// Create a virtual transceiver from configuration
    pub fn from_config(config: VirtualTransceiverConfig) -> Self {
        Self {
            id: config.id,
            vfo_a_hz: config.initial_vfo_a_hz,
            vfo_b_hz: config.initial_vfo_b_hz,
            mode: config.initial_mode,
            active_vfo: Vfo::A,
            transmitting: false,
            audio_path: false,
            auto_info: false,
            power_watts: config.power_watts,
            responding: true,
            pending_output: VecDeque::new(),
            received_frames: Vec::new(),
        }
    }

    /// Get the identification digits
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the frequency of one VFO in Hz
    pub fn frequency_hz(&self, vfo: Vfo) -> u64 {
        match vfo {
            Vfo::A => self.vfo_a_hz,
            Vfo::B => self.vfo_b_hz,
        }
    }

    /// Get the current operating mode
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Get the selected VFO
    pub fn active_vfo(&self) -> Vfo {
        self.active_vfo
    }

    /// Get the keyed state
    pub fn transmitting(&self) -> bool {
        self.transmitting
    }

    /// Get the serial audio path state
    pub fn audio_path(&self) -> bool {
        self.audio_path
    }

    /// Get whether auto-information reporting is enabled
    pub fn auto_info(&self) -> bool {
        self.auto_info
    }

    /// Get the forward power delivered while keyed
    pub fn power_watts(&self) -> f32 {
        self.power_watts
    }

    /// Script the forward power reading (0.0 simulates a fault)
    pub fn set_power_watts(&mut self, watts: f32) {
        self.power_watts = watts;
    }

    /// Get whether the radio is answering traffic
    pub fn responding(&self) -> bool {
        self.responding
    }

    /// Script radio liveness; while false every frame is swallowed
    pub fn set_responding(&mut self, responding: bool) {
        self.responding = responding;
    }

    /// Script a front-panel frequency change
    ///
    /// Queues an unsolicited report when auto-information is enabled.
    pub fn set_frequency(&mut self, vfo: Vfo, hz: u64) {
        let slot = match vfo {
            Vfo::A => &mut self.vfo_a_hz,
            Vfo::B => &mut self.vfo_b_hz,
        };
        if *slot != hz {
            *slot = hz;
            if self.auto_info {
                self.pending_output.push_back(response::frequency(vfo, hz));
            }
        }
    }

    /// Script a front-panel mode change
    ///
    /// Queues an unsolicited report when auto-information is enabled.
    pub fn set_mode(&mut self, mode: OperatingMode) {
        if self.mode != mode {
            self.mode = mode;
            if self.auto_info {
                self.pending_output.push_back(response::mode(mode));
            }
        }
    }

    /// Process one frame sent to the radio
    ///
    /// Updates internal state, queues any reply, and returns true if
    /// externally visible state changed. Stores the frame for test
    /// verification.
    pub fn process_frame(&mut self, data: &[u8]) -> bool {
        self.received_frames.push(data.to_vec());

        if !self.responding {
            return false;
        }

        let command = match parse_frame(data) {
            Ok(command) => command,
            Err(_) => {
                self.pending_output.push_back(response::rejection());
                return false;
            }
        };

        match command {
            CatCommand::FrequencyA(None) => {
                self.pending_output
                    .push_back(response::frequency(Vfo::A, self.vfo_a_hz));
                false
            }
            CatCommand::FrequencyA(Some(hz)) => {
                let changed = self.vfo_a_hz != hz;
                self.vfo_a_hz = hz;
                changed
            }
            CatCommand::FrequencyB(None) => {
                self.pending_output
                    .push_back(response::frequency(Vfo::B, self.vfo_b_hz));
                false
            }
            CatCommand::FrequencyB(Some(hz)) => {
                let changed = self.vfo_b_hz != hz;
                self.vfo_b_hz = hz;
                changed
            }
            CatCommand::Mode(None) => {
                self.pending_output.push_back(response::mode(self.mode));
                false
            }
            CatCommand::Mode(Some(mode)) => {
                let changed = self.mode != mode;
                self.mode = mode;
                changed
            }
            CatCommand::RxVfo(None) => {
                self.pending_output
                    .push_back(response::rx_vfo(self.active_vfo));
                false
            }
            CatCommand::RxVfo(Some(vfo)) => {
                let changed = self.active_vfo != vfo;
                self.active_vfo = vfo;
                changed
            }
            CatCommand::TxVfo(None) => {
                self.pending_output
                    .push_back(response::tx_vfo(self.active_vfo));
                false
            }
            CatCommand::TxVfo(Some(vfo)) => {
                let changed = self.active_vfo != vfo;
                self.active_vfo = vfo;
                changed
            }
            CatCommand::AutoInfo(None) => {
                self.pending_output
                    .push_back(response::auto_info(self.auto_info));
                false
            }
            CatCommand::AutoInfo(Some(enabled)) => {
                self.auto_info = enabled;
                false
            }
            CatCommand::Id(None) => {
                self.pending_output
                    .push_back(format!("ID{};", self.id).into_bytes());
                false
            }
            CatCommand::Status(None) => {
                self.pending_output
                    .push_back(response::status(&self.status_report()));
                false
            }
            CatCommand::PowerStatus(None) => {
                // the sim is always powered up
                self.pending_output.push_back(response::power_status(true));
                false
            }
            CatCommand::Transmit(_) => {
                let changed = !self.transmitting;
                self.transmitting = true;
                changed
            }
            CatCommand::Receive => {
                let changed = self.transmitting;
                self.transmitting = false;
                changed
            }
            CatCommand::AudioPath(None) => {
                self.pending_output
                    .push_back(CatCommand::AudioPath(Some(self.audio_path)).encode());
                false
            }
            CatCommand::AudioPath(Some(enabled)) => {
                let changed = self.audio_path != enabled;
                self.audio_path = enabled;
                changed
            }
            CatCommand::PowerMeter(None) => {
                // the meter reads forward power, zero while unkeyed
                let tenths = if self.transmitting {
                    (self.power_watts * 10.0).round() as u16
                } else {
                    0
                };
                self.pending_output
                    .push_back(CatCommand::PowerMeter(Some(tenths)).encode());
                false
            }
            // audio payload is consumed silently
            CatCommand::AudioBlock(_) => false,
            // report forms arriving at the radio are ignored
            CatCommand::Id(Some(_))
            | CatCommand::Status(Some(_))
            | CatCommand::PowerStatus(Some(_))
            | CatCommand::PowerMeter(Some(_))
            | CatCommand::Rejected => false,
            CatCommand::Unknown(_) => {
                self.pending_output.push_back(response::rejection());
                false
            }
        }
    }

    /// Snapshot the state carried by the composite status report
    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            frequency_hz: self.frequency_hz(self.active_vfo),
            mode: self.mode,
            active_vfo: self.active_vfo,
            transmitting: self.transmitting,
        }
    }

    /// Take the next pending output frame
    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.pending_output.pop_front()
    }

    /// Check if there is pending output
    pub fn has_output(&self) -> bool {
        !self.pending_output.is_empty()
    }

    /// Clear all pending output
    pub fn clear_output(&mut self) {
        self.pending_output.clear();
    }

    /// Get the number of pending output frames
    pub fn output_count(&self) -> usize {
        self.pending_output.len()
    }

    /// Get all received frames (for test verification)
    pub fn received_frames(&self) -> &[Vec<u8>] {
        &self.received_frames
    }

    /// Clear received frames
    pub fn clear_received(&mut self) {
        self.received_frames.clear();
    }

    /// Get a summary of current state
    pub fn state_summary(&self) -> String {
        format!(
            "ID{} {:.3} MHz {} VFO {}{}{}",
            self.id,
            self.frequency_hz(self.active_vfo) as f64 / 1_000_000.0,
            self.mode.name(),
            self.active_vfo.name(),
            if self.transmitting { " [TX]" } else { "" },
            if self.audio_path { " [AUDIO]" } else { "" },
        )
    }
}

impl Default for VirtualTransceiver {
    fn default() -> Self {
        Self::new()
    }
}

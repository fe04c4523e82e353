//! Keying sequencer
//!
//! The transceiver corrupts its audio-path state if transmit commands
//! arrive while the audio path is still settling, so every key and unkey
//! runs through a fixed sequence: enable audio, wait for the settle
//! delay, start transmitting; and on the way down stop transmitting,
//! disable audio, wait again. The machine here decides the sequence; the
//! bridge actor performs the writes and owns the settle timer.
//!
//! All keying paths (VOX, hardware PTT line, CAT commands) funnel through
//! [`PttMachine::request_start`] and [`PttMachine::request_stop`]. No
//! other code writes transmit or audio-path commands.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a keying request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Audio level crossed the VOX threshold
    Vox,
    /// Hardware PTT line edge
    HardwareLine,
    /// Client CAT command
    CatCommand,
}

impl TriggerSource {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vox => "VOX",
            Self::HardwareLine => "PTT line",
            Self::CatCommand => "CAT",
        }
    }
}

/// Keying sequence phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PttPhase {
    /// Receiving, audio path down
    #[default]
    Idle,
    /// Audio-enable sent, settle delay running
    EnablingAudio,
    /// Keyed
    Transmitting,
    /// Transmit-stop and audio-disable sent, settle delay running
    DisablingAudio,
}

impl PttPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::EnablingAudio => "EnablingAudio",
            Self::Transmitting => "Transmitting",
            Self::DisablingAudio => "DisablingAudio",
        }
    }
}

/// Steps the machine asks the caller to perform, in order
///
/// `EnableAudio` and `DisableAudio` arm the settle delay after the write;
/// `StartTransmit` sets the shared transmitting flag true after the
/// write, `StopTransmit` clears it after the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttAction {
    /// Write the audio-path enable command, then arm the settle delay
    EnableAudio,
    /// Write the transmit-start command
    StartTransmit,
    /// Write the transmit-stop command
    StopTransmit,
    /// Write the audio-path disable command, then arm the settle delay
    DisableAudio,
}

/// A trigger that arrived mid-transition, applied once the settle
/// delay completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Start(TriggerSource),
    Stop(TriggerSource),
}

/// Keying sequencer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PttConfig {
    /// Settle delay between audio-path and transmit commands (ms)
    pub settle_ms: u64,
    /// Audio level at or above this keys via VOX (0.0..=1.0)
    pub vox_threshold: f32,
    /// VOX hang time before unkeying (ms)
    pub vox_hang_ms: u64,
}

impl Default for PttConfig {
    fn default() -> Self {
        Self {
            settle_ms: 10,
            vox_threshold: 0.05,
            vox_hang_ms: 300,
        }
    }
}

/// The keying state machine
///
/// Transitions never interleave: a trigger for the opposite direction
/// during a settle delay is queued (latest wins) and applied after the
/// in-flight transition completes. Re-entrant triggers are no-ops.
#[derive(Debug, Default)]
pub struct PttMachine {
    phase: PttPhase,
    pending: Option<Pending>,
}

impl PttMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    pub fn phase(&self) -> PttPhase {
        self.phase
    }

    /// Whether a settle delay is expected to be running
    pub fn in_transition(&self) -> bool {
        matches!(self.phase, PttPhase::EnablingAudio | PttPhase::DisablingAudio)
    }

    /// Request keying from any trigger source
    pub fn request_start(&mut self, source: TriggerSource) -> Vec<PttAction> {
        match self.phase {
            PttPhase::Idle => {
                debug!("key down ({})", source.name());
                self.phase = PttPhase::EnablingAudio;
                self.pending = None;
                vec![PttAction::EnableAudio]
            }
            PttPhase::EnablingAudio => {
                // already keying; a queued stop is superseded
                self.pending = None;
                Vec::new()
            }
            PttPhase::Transmitting => Vec::new(),
            PttPhase::DisablingAudio => {
                debug!("key down ({}) queued behind unkey settle", source.name());
                self.pending = Some(Pending::Start(source));
                Vec::new()
            }
        }
    }

    /// Request unkeying from any trigger source
    pub fn request_stop(&mut self, source: TriggerSource) -> Vec<PttAction> {
        match self.phase {
            PttPhase::Transmitting => {
                debug!("key up ({})", source.name());
                self.phase = PttPhase::DisablingAudio;
                self.pending = None;
                vec![PttAction::StopTransmit, PttAction::DisableAudio]
            }
            PttPhase::DisablingAudio => {
                self.pending = None;
                Vec::new()
            }
            PttPhase::Idle => Vec::new(),
            PttPhase::EnablingAudio => {
                debug!("key up ({}) queued behind key settle", source.name());
                self.pending = Some(Pending::Stop(source));
                Vec::new()
            }
        }
    }

    /// The settle delay elapsed; complete the in-flight transition and
    /// start the queued one, if any
    pub fn settle_elapsed(&mut self) -> Vec<PttAction> {
        match self.phase {
            PttPhase::EnablingAudio => {
                self.phase = PttPhase::Transmitting;
                let mut actions = vec![PttAction::StartTransmit];
                if let Some(Pending::Stop(source)) = self.pending.take() {
                    actions.extend(self.request_stop(source));
                }
                actions
            }
            PttPhase::DisablingAudio => {
                self.phase = PttPhase::Idle;
                if let Some(Pending::Start(source)) = self.pending.take() {
                    self.request_start(source)
                } else {
                    Vec::new()
                }
            }
            // spurious timer fire after a reset
            PttPhase::Idle | PttPhase::Transmitting => Vec::new(),
        }
    }

    /// Drop any in-flight transition and return to idle without writes
    ///
    /// Used when the link is re-established: the hardware came back in
    /// receive state, so the machine resyncs to it.
    pub fn force_idle(&mut self) {
        if self.phase != PttPhase::Idle {
            debug!("keying sequencer reset from {}", self.phase.name());
        }
        self.phase = PttPhase::Idle;
        self.pending = None;
    }
}

/// Outcome of feeding one audio level sample to the VOX gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoxAction {
    /// Level crossed the threshold; request keying and arm the hang timer
    Key,
    /// Still above threshold while keyed; push the hang deadline out
    Rearm,
}

/// Maps audio level samples onto keying triggers
///
/// A sample at or above the threshold keys (or holds the key); once
/// samples stay below it for the whole hang time, the gate releases and
/// the caller requests unkeying.
#[derive(Debug)]
pub struct VoxGate {
    threshold: f32,
    engaged: bool,
}

impl VoxGate {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            engaged: false,
        }
    }

    /// Whether the gate currently holds the key
    pub fn engaged(&self) -> bool {
        self.engaged
    }

    /// Feed one audio level sample
    pub fn sample(&mut self, level: f32) -> Option<VoxAction> {
        if level < self.threshold {
            return None;
        }
        if self.engaged {
            Some(VoxAction::Rearm)
        } else {
            self.engaged = true;
            Some(VoxAction::Key)
        }
    }

    /// The hang timer expired without a fresh trigger; release the gate.
    /// Returns true if the caller should request unkeying.
    pub fn hang_expired(&mut self) -> bool {
        std::mem::take(&mut self.engaged)
    }

    /// Release the gate without unkeying (link went down)
    pub fn reset(&mut self) {
        self.engaged = false;
    }
}

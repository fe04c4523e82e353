//! Virtual transceiver actor task
//!
//! This module provides a pure async task that owns a VirtualTransceiver
//! and communicates via an async stream. The task uses a select! loop to:
//! - Read CAT frames from the connection stream and process them
//! - Handle scripting commands from a channel
//! - Emit state change events via a broadcast channel

use std::io;

use qrp_protocol::{CatCodec, OperatingMode, Vfo};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::VirtualTransceiver;

/// Commands that can be sent to a virtual transceiver actor
///
/// These script the radio side of a test: front-panel changes, power
/// faults, a CPU that stops answering.
#[derive(Debug, Clone)]
pub enum VirtualRadioCommand {
    /// Script the forward power reading (0.0 simulates a fault)
    SetPowerWatts(f32),
    /// Script radio liveness; while false every frame is swallowed
    SetResponding(bool),
    /// Script a front-panel frequency change
    SetFrequency { vfo: Vfo, hz: u64 },
    /// Script a front-panel mode change
    SetMode(OperatingMode),
    /// Shutdown the virtual transceiver actor
    Shutdown,
}

/// State event emitted when virtual transceiver state changes
#[derive(Debug, Clone)]
pub struct VirtualRadioStateEvent {
    /// Active VFO frequency in Hz
    pub frequency_hz: u64,
    /// Current operating mode
    pub mode: OperatingMode,
    /// Keyed state
    pub transmitting: bool,
    /// Serial audio path state
    pub audio_path: bool,
}

impl VirtualRadioStateEvent {
    fn snapshot(radio: &VirtualTransceiver) -> Self {
        Self {
            frequency_hz: radio.frequency_hz(radio.active_vfo()),
            mode: radio.mode(),
            transmitting: radio.transmitting(),
            audio_path: radio.audio_path(),
        }
    }
}

/// Run the virtual transceiver actor task
///
/// This task owns the VirtualTransceiver and processes:
/// 1. CAT frames read from the stream (sent by the bridge)
/// 2. Scripting commands from the command channel
///
/// Replies queued by the radio are written back to the stream. State
/// changes are emitted via the broadcast channel so tests can observe
/// the exact order the radio saw things happen in.
pub async fn run_virtual_radio_task<S>(
    mut stream: S,
    mut radio: VirtualTransceiver,
    mut cmd_rx: mpsc::Receiver<VirtualRadioCommand>,
    state_tx: broadcast::Sender<VirtualRadioStateEvent>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut codec = CatCodec::new();
    let mut buf = [0u8; 1024];

    info!("Starting virtual transceiver task: {}", radio.state_summary());

    // Emit initial state
    let _ = state_tx.send(VirtualRadioStateEvent::snapshot(&radio));

    loop {
        tokio::select! {
            // Read CAT frames from the connection stream
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual transceiver stream closed");
                        break;
                    }
                    Ok(n) => {
                        codec.push_bytes(&buf[..n]);

                        // one event per state-changing frame, so observers
                        // see transitions in the order the radio took them
                        while let Some(frame) = codec.next_frame() {
                            debug!(
                                "Virtual transceiver processing frame: {:?}",
                                String::from_utf8_lossy(&frame)
                            );
                            if radio.process_frame(&frame) {
                                debug!(
                                    "Virtual transceiver state changed: {}",
                                    radio.state_summary()
                                );
                                let _ = state_tx.send(VirtualRadioStateEvent::snapshot(&radio));
                            }
                        }

                        flush_output(&mut stream, &mut radio).await?;
                    }
                    Err(e) => {
                        warn!("Virtual transceiver stream error: {}", e);
                        return Err(e);
                    }
                }
            }

            // Handle scripting commands from the channel
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualRadioCommand::SetPowerWatts(watts)) => {
                        info!("Virtual transceiver forward power set to {:.1}W", watts);
                        radio.set_power_watts(watts);
                    }
                    Some(VirtualRadioCommand::SetResponding(responding)) => {
                        info!("Virtual transceiver responding set to {}", responding);
                        radio.set_responding(responding);
                    }
                    Some(VirtualRadioCommand::SetFrequency { vfo, hz }) => {
                        radio.set_frequency(vfo, hz);
                        flush_output(&mut stream, &mut radio).await?;
                        let _ = state_tx.send(VirtualRadioStateEvent::snapshot(&radio));
                    }
                    Some(VirtualRadioCommand::SetMode(mode)) => {
                        radio.set_mode(mode);
                        flush_output(&mut stream, &mut radio).await?;
                        let _ = state_tx.send(VirtualRadioStateEvent::snapshot(&radio));
                    }
                    Some(VirtualRadioCommand::Shutdown) => {
                        info!("Shutdown requested for virtual transceiver");
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual transceiver");
                        break;
                    }
                }
            }
        }
    }

    info!("Virtual transceiver task ended");
    Ok(())
}

/// Write any pending radio output back to the stream
async fn flush_output<S>(stream: &mut S, radio: &mut VirtualTransceiver) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut wrote = false;
    while let Some(output) = radio.take_output() {
        stream.write_all(&output).await?;
        wrote = true;
    }
    if wrote {
        let _ = stream.flush().await;
    }
    Ok(())
}

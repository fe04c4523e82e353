//! Bridge actor
//!
//! All bridge activity runs through this single actor: client traffic,
//! radio traffic, keying, power polling, and link supervision. Client
//! sessions and link I/O live in their own spawned tasks and talk to the
//! actor through channels, so there is exactly one place where state
//! changes and no locks are held across await points.
//!
//! # Architecture
//!
//! The actor receives [`BridgeCommand`]s through a channel and emits
//! [`LinkEvent`]s through another. Timed work (power polls, settle
//! delays, VOX hang, reconnect backoff, hardware probing) runs as timer
//! branches of the same select loop.
//!
//! Each opened link gets a generation number. Data and loss reports
//! carry the generation of the link they came from, and the actor drops
//! anything from a superseded generation, so a slow-dying task cannot
//! poison its replacement.

use std::time::SystemTime;

use qrp_detect::{ProbeConfig, RadioProber};
use qrp_protocol::{parse_frame, response, CatCodec, CatCommand};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::connection::{spawn_link_task, LinkConnector, LinkTaskCommand};
use crate::events::LinkEvent;
use crate::interpreter::{
    interpret_client_frame, interpret_hardware_frame, rejection_for, ClientAction, HardwareAction,
};
use crate::power::{PowerClass, PowerMonitor, PowerMonitorConfig};
use crate::ptt::{PttAction, PttConfig, PttMachine, PttPhase, TriggerSource, VoxAction, VoxGate};
use crate::state::StateStore;
use crate::supervisor::{ConnectionState, LinkSupervisor, ReconnectDirective, SupervisorConfig};

/// Bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Keying sequencer settings
    pub ptt: PttConfig,
    /// Power monitor settings
    pub power: PowerMonitorConfig,
    /// Link supervision settings
    pub supervisor: SupervisorConfig,
}

/// Commands sent to the bridge actor
#[derive(Debug)]
pub enum BridgeCommand {
    /// A control client attached; replies and relays go to `tx`
    ClientAttached {
        /// Sink for bytes addressed to the client
        tx: mpsc::Sender<Vec<u8>>,
        /// Peer description for logging and events
        peer: String,
    },

    /// The control client went away
    ClientDetached,

    /// Raw bytes from the control client
    ClientData {
        /// Bytes as received, frame boundaries not guaranteed
        data: Vec<u8>,
    },

    /// Audio level sample for the VOX gate
    AudioLevel {
        /// Peak level in the last window, 0.0 to 1.0
        level: f32,
    },

    /// Hardware PTT line edge
    PttLine {
        /// Line state after the edge
        asserted: bool,
    },

    /// Raw bytes from a link I/O task
    LinkData {
        /// Connection generation the bytes came from
        id: u64,
        /// Bytes as received
        data: Vec<u8>,
    },

    /// A link I/O task died
    LinkClosed {
        /// Connection generation that died
        id: u64,
        /// Why it died
        reason: String,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Internal state for the bridge actor
struct BridgeState<C: LinkConnector> {
    connector: C,
    store: StateStore,
    config: BridgeConfig,
    supervisor: LinkSupervisor,
    ptt: PttMachine,
    vox: VoxGate,
    power: PowerMonitor,
    /// Sink for the attached control client, if any
    client_tx: Option<mpsc::Sender<Vec<u8>>>,
    client_codec: CatCodec,
    /// Sender into the current link I/O task
    link_tx: Option<mpsc::Sender<LinkTaskCommand>>,
    link_codec: CatCodec,
    /// Generation of the current link; stale task messages are fenced off
    generation: u64,
    /// Meter replies owed to the actor's own polls, not the client
    pending_power_replies: u32,
    /// Actor-level events awaiting the next flush
    events: Vec<LinkEvent>,
    settle_deadline: Option<Instant>,
    vox_deadline: Option<Instant>,
    reconnect_at: Option<Instant>,
    last_rx_at: Instant,
}

impl<C: LinkConnector> BridgeState<C> {
    fn new(connector: C, store: StateStore, config: BridgeConfig) -> Self {
        let supervisor = LinkSupervisor::new(config.supervisor.clone());
        let vox = VoxGate::new(config.ptt.vox_threshold);
        let power = PowerMonitor::new(config.power.clone());
        Self {
            connector,
            store,
            config,
            supervisor,
            ptt: PttMachine::new(),
            vox,
            power,
            client_tx: None,
            client_codec: CatCodec::new(),
            link_tx: None,
            link_codec: CatCodec::new(),
            generation: 0,
            pending_power_replies: 0,
            events: Vec::new(),
            settle_deadline: None,
            vox_deadline: None,
            reconnect_at: None,
            last_rx_at: Instant::now(),
        }
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.config.ptt.settle_ms)
    }

    fn vox_hang(&self) -> Duration {
        Duration::from_millis(self.config.ptt.vox_hang_ms)
    }

    fn quiet_timeout(&self) -> Duration {
        Duration::from_millis(self.config.supervisor.quiet_timeout_ms)
    }
}

/// Run the bridge actor
///
/// Connects through `connector`, then serves until a
/// [`BridgeCommand::Shutdown`] arrives or the command channel closes.
/// `cmd_tx` must be the sender side of `cmd_rx`; spawned link tasks
/// report back through it.
pub async fn run_bridge_actor<C: LinkConnector>(
    connector: C,
    store: StateStore,
    config: BridgeConfig,
    cmd_tx: mpsc::Sender<BridgeCommand>,
    mut cmd_rx: mpsc::Receiver<BridgeCommand>,
    event_tx: mpsc::Sender<LinkEvent>,
) {
    let mut state = BridgeState::new(connector, store, config);
    info!("bridge actor started");

    let mut poll_timer = interval(Duration::from_millis(
        state.config.power.poll_interval_ms.max(1),
    ));
    poll_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut probe_timer = interval(Duration::from_millis(
        state.config.supervisor.probe_interval_ms.max(1),
    ));
    probe_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    state.supervisor.begin_connect();
    attempt_connect(&mut state, &cmd_tx).await;
    flush_events(&mut state, &event_tx).await;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                if matches!(cmd, BridgeCommand::Shutdown) {
                    info!("shutdown requested");
                    break;
                }
                handle_command(&mut state, cmd).await;
            }

            _ = poll_timer.tick(), if state.supervisor.is_connected() => {
                poll_power(&mut state).await;
            }

            _ = probe_timer.tick(),
                if state.supervisor.state() == ConnectionState::Failed =>
            {
                if state.connector.hardware_present().await {
                    state.supervisor.hardware_detected();
                    state.reconnect_at = Some(Instant::now());
                }
            }

            _ = deadline(state.settle_deadline), if state.settle_deadline.is_some() => {
                state.settle_deadline = None;
                let actions = state.ptt.settle_elapsed();
                perform_ptt_actions(&mut state, actions).await;
            }

            _ = deadline(state.vox_deadline), if state.vox_deadline.is_some() => {
                state.vox_deadline = None;
                if state.vox.hang_expired() {
                    request_unkey(&mut state, TriggerSource::Vox).await;
                }
            }

            _ = deadline(state.reconnect_at), if state.reconnect_at.is_some() => {
                state.reconnect_at = None;
                attempt_connect(&mut state, &cmd_tx).await;
            }

            _ = sleep_until(state.last_rx_at + state.quiet_timeout()),
                if state.supervisor.is_connected() =>
            {
                handle_link_down(&mut state, "no traffic inside the quiet window").await;
            }
        }

        flush_events(&mut state, &event_tx).await;
    }

    shutdown(&mut state).await;
    flush_events(&mut state, &event_tx).await;
    info!("bridge actor stopped");
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        // disabled by the branch guard
        None => std::future::pending().await,
    }
}

async fn handle_command<C: LinkConnector>(state: &mut BridgeState<C>, cmd: BridgeCommand) {
    match cmd {
        BridgeCommand::ClientAttached { tx, peer } => {
            if state.client_tx.is_some() {
                info!("replacing attached client with {peer}");
            } else {
                info!("client attached from {peer}");
            }
            state.client_tx = Some(tx);
            state.client_codec.clear();
            state.events.push(LinkEvent::ClientConnected {
                peer,
                timestamp: SystemTime::now(),
            });
        }

        BridgeCommand::ClientDetached => {
            state.client_tx = None;
            state.events.push(LinkEvent::ClientDisconnected {
                timestamp: SystemTime::now(),
            });
            // unkey if the departing client left the radio keyed
            if state.ptt.phase() != PttPhase::Idle {
                request_unkey(state, TriggerSource::CatCommand).await;
            }
        }

        BridgeCommand::ClientData { data } => {
            state.client_codec.push_bytes(&data);
            while let Some(frame) = state.client_codec.next_frame() {
                handle_client_frame(state, &frame).await;
            }
        }

        BridgeCommand::AudioLevel { level } => {
            match state.vox.sample(level) {
                Some(VoxAction::Key) => {
                    state.vox_deadline = Some(Instant::now() + state.vox_hang());
                    request_key(state, TriggerSource::Vox).await;
                }
                Some(VoxAction::Rearm) => {
                    state.vox_deadline = Some(Instant::now() + state.vox_hang());
                }
                None => {}
            }
        }

        BridgeCommand::PttLine { asserted } => {
            if asserted {
                request_key(state, TriggerSource::HardwareLine).await;
            } else {
                request_unkey(state, TriggerSource::HardwareLine).await;
            }
        }

        BridgeCommand::LinkData { id, data } => {
            if id != state.generation {
                debug!("dropping {} bytes from superseded link {id}", data.len());
                return;
            }
            state.last_rx_at = Instant::now();
            state.link_codec.push_bytes(&data);
            while let Some(frame) = state.link_codec.next_frame() {
                if handle_hardware_frame(state, &frame).await {
                    // the link was recycled; the rest of the batch died with it
                    break;
                }
            }
        }

        BridgeCommand::LinkClosed { id, reason } => {
            if id != state.generation {
                debug!("ignoring loss report from superseded link {id}");
                return;
            }
            handle_link_down(state, &reason).await;
        }

        // intercepted by the run loop
        BridgeCommand::Shutdown => {}
    }
}

async fn handle_client_frame<C: LinkConnector>(state: &mut BridgeState<C>, frame: &[u8]) {
    let cmd = match parse_frame(frame) {
        Ok(cmd) => cmd,
        Err(e) => {
            match rejection_for(&e) {
                Some(rejection) => send_to_client(state, rejection).await,
                None => debug!("dropping malformed client frame: {e}"),
            }
            return;
        }
    };

    let connected = state.supervisor.is_connected();
    for action in interpret_client_frame(&state.store, connected, &cmd) {
        match action {
            ClientAction::Reply(bytes) => send_to_client(state, bytes).await,
            ClientAction::Forward(bytes) => {
                send_to_link(state, bytes).await;
            }
            ClientAction::KeyDown => request_key(state, TriggerSource::CatCommand).await,
            ClientAction::KeyUp => request_unkey(state, TriggerSource::CatCommand).await,
        }
    }
}

/// Returns true if the frame forced the link down
async fn handle_hardware_frame<C: LinkConnector>(state: &mut BridgeState<C>, frame: &[u8]) -> bool {
    let cmd = match parse_frame(frame) {
        Ok(cmd) => cmd,
        Err(e) => {
            debug!("unparseable frame from radio: {e}");
            return false;
        }
    };

    // replies owed to the actor's own meter polls never reach the client
    let internal_reply =
        matches!(cmd, CatCommand::PowerMeter(Some(_))) && state.pending_power_replies > 0;
    if internal_reply {
        state.pending_power_replies -= 1;
    }

    for action in interpret_hardware_frame(&state.store, &cmd) {
        match action {
            HardwareAction::Relay(bytes) => send_to_client(state, bytes).await,
            HardwareAction::PowerReading { watts } => {
                if !internal_reply {
                    send_to_client(state, cmd.encode()).await;
                }
                match state.power.record(watts, state.store.transmitting()) {
                    PowerClass::Normal => {}
                    PowerClass::Warning { watts, consecutive } => {
                        warn!("zero forward power while keyed: {watts:.1} W ({consecutive} in a row)");
                        state.events.push(LinkEvent::PowerWarning {
                            watts,
                            consecutive,
                            timestamp: SystemTime::now(),
                        });
                    }
                    PowerClass::Critical { consecutive } => {
                        state.events.push(LinkEvent::PowerCritical {
                            consecutive,
                            timestamp: SystemTime::now(),
                        });
                        handle_link_down(state, "sustained zero forward power").await;
                        return true;
                    }
                }
            }
        }
    }
    false
}

async fn attempt_connect<C: LinkConnector>(
    state: &mut BridgeState<C>,
    cmd_tx: &mpsc::Sender<BridgeCommand>,
) {
    let connect_timeout = Duration::from_millis(state.config.supervisor.connect_timeout_ms);
    let handshake_timeout = Duration::from_millis(state.config.supervisor.handshake_timeout_ms);

    let mut stream = match tokio::time::timeout(connect_timeout, state.connector.connect()).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            schedule_retry(state, &e.to_string());
            return;
        }
        Err(_) => {
            schedule_retry(state, "connect timed out");
            return;
        }
    };

    // identify before trusting the link
    let prober = RadioProber::with_config(ProbeConfig {
        timeout: handshake_timeout,
        settle_delay: Duration::ZERO,
    });
    let Some(probe) = prober.probe(&mut stream).await else {
        schedule_retry(state, "no identification from the radio");
        return;
    };
    debug!("link handshake complete, radio ID{}", probe.id);

    state.generation += 1;
    state.link_codec.clear();
    state.last_rx_at = Instant::now();
    state.pending_power_replies = 0;
    state.power.reset();

    // the radio comes back in receive; resync the keying state to it
    state.store.set_transmitting(false);
    state.ptt.force_idle();
    state.vox.reset();
    state.settle_deadline = None;
    state.vox_deadline = None;
    state.reconnect_at = None;

    let link_tx = spawn_link_task(state.generation, stream, cmd_tx.clone());
    // ask the hardware to volunteer reports, then seed the mirror from it
    let _ = link_tx
        .send(LinkTaskCommand::Write(b"AI2;FA;FB;MD;FR;".to_vec()))
        .await;
    state.link_tx = Some(link_tx);

    state.supervisor.connection_established();

    if state.store.auto_info() {
        let status = response::status(&state.store.status_report());
        send_to_client(state, status).await;
    }
}

fn schedule_retry<C: LinkConnector>(state: &mut BridgeState<C>, error: &str) {
    match state.supervisor.attempt_failed(error) {
        ReconnectDirective::AttemptNow => state.reconnect_at = Some(Instant::now()),
        ReconnectDirective::AttemptAfter(delay) => {
            state.reconnect_at = Some(Instant::now() + delay);
        }
        ReconnectDirective::GiveUp => state.reconnect_at = None,
    }
}

async fn handle_link_down<C: LinkConnector>(state: &mut BridgeState<C>, reason: &str) {
    if let Some(link_tx) = state.link_tx.take() {
        let _ = link_tx.try_send(LinkTaskCommand::Shutdown);
    }
    // fence off anything still in flight from the dead link
    state.generation += 1;
    state.link_codec.clear();
    state.pending_power_replies = 0;
    state.power.reset();
    state.settle_deadline = None;
    state.vox_deadline = None;
    state.vox.reset();

    // the keyed flag stays as it was; only a successful reconnect may
    // clear it, and the keying sequencer resyncs at the same moment
    let transmitting = state.store.transmitting();
    match state.supervisor.connection_lost(reason, transmitting) {
        ReconnectDirective::AttemptNow => state.reconnect_at = Some(Instant::now()),
        ReconnectDirective::AttemptAfter(delay) => {
            state.reconnect_at = Some(Instant::now() + delay);
        }
        ReconnectDirective::GiveUp => state.reconnect_at = None,
    }
}

async fn request_key<C: LinkConnector>(state: &mut BridgeState<C>, source: TriggerSource) {
    if !state.supervisor.is_connected() {
        debug!("ignoring key request from {}, link down", source.name());
        return;
    }
    let actions = state.ptt.request_start(source);
    perform_ptt_actions(state, actions).await;
}

async fn request_unkey<C: LinkConnector>(state: &mut BridgeState<C>, source: TriggerSource) {
    if !state.supervisor.is_connected() {
        debug!("ignoring unkey request from {}, link down", source.name());
        return;
    }
    let actions = state.ptt.request_stop(source);
    perform_ptt_actions(state, actions).await;
}

async fn perform_ptt_actions<C: LinkConnector>(state: &mut BridgeState<C>, actions: Vec<PttAction>) {
    for action in actions {
        match action {
            PttAction::EnableAudio => {
                send_to_link(state, CatCommand::AudioPath(Some(true)).encode()).await;
                state.settle_deadline = Some(Instant::now() + state.settle_delay());
            }
            PttAction::StartTransmit => {
                send_to_link(state, CatCommand::Transmit(Some(0)).encode()).await;
                state.store.set_transmitting(true);
                push_keyed_report(state).await;
            }
            PttAction::StopTransmit => {
                send_to_link(state, CatCommand::Receive.encode()).await;
                state.store.set_transmitting(false);
                push_keyed_report(state).await;
            }
            PttAction::DisableAudio => {
                send_to_link(state, CatCommand::AudioPath(Some(false)).encode()).await;
                state.settle_deadline = Some(Instant::now() + state.settle_delay());
            }
        }
    }
}

/// Announce a keyed-state change to a client that asked for reports
async fn push_keyed_report<C: LinkConnector>(state: &mut BridgeState<C>) {
    if state.store.auto_info() {
        let status = response::status(&state.store.status_report());
        send_to_client(state, status).await;
    }
}

async fn poll_power<C: LinkConnector>(state: &mut BridgeState<C>) {
    if send_to_link(state, CatCommand::PowerMeter(None).encode()).await {
        state.pending_power_replies += 1;
    }
}

async fn send_to_link<C: LinkConnector>(state: &mut BridgeState<C>, data: Vec<u8>) -> bool {
    let Some(link_tx) = state.link_tx.clone() else {
        return false;
    };
    // a failed send means the task died; its loss report is on the way
    link_tx.send(LinkTaskCommand::Write(data)).await.is_ok()
}

async fn send_to_client<C: LinkConnector>(state: &mut BridgeState<C>, data: Vec<u8>) {
    let Some(client_tx) = state.client_tx.clone() else {
        return;
    };
    if client_tx.send(data).await.is_err() {
        debug!("client channel closed");
        state.client_tx = None;
    }
}

async fn flush_events<C: LinkConnector>(
    state: &mut BridgeState<C>,
    event_tx: &mpsc::Sender<LinkEvent>,
) {
    for event in state.events.drain(..) {
        let _ = event_tx.send(event).await;
    }
    for event in state.supervisor.drain_events() {
        let _ = event_tx.send(event).await;
    }
}

async fn shutdown<C: LinkConnector>(state: &mut BridgeState<C>) {
    if state.supervisor.is_connected() && state.ptt.phase() != PttPhase::Idle {
        info!("unkeying on the way out");
        send_to_link(state, CatCommand::Receive.encode()).await;
        send_to_link(state, CatCommand::AudioPath(Some(false)).encode()).await;
        state.store.set_transmitting(false);
    }
    if let Some(link_tx) = state.link_tx.take() {
        let _ = link_tx.send(LinkTaskCommand::Shutdown).await;
    }
}

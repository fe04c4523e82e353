//! End-to-end tests for the bridge actor
//!
//! Each test wires the actor to a virtual transceiver from `qrp-sim`
//! over an in-memory duplex stream, drives it through the client
//! command channel, and observes both sides: CAT frames flowing back to
//! the client and state transitions reported by the radio itself.

use std::time::Duration;

use qrp_link::{
    run_bridge_actor, BridgeCommand, BridgeConfig, ConnectionState, LinkConnector, LinkError,
    LinkEvent, StateStore,
};
use qrp_protocol::{CatCodec, Vfo};
use qrp_sim::{
    run_virtual_radio_task, VirtualRadioCommand, VirtualRadioStateEvent, VirtualTransceiver,
};
use tokio::io::DuplexStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

// =========================================================================
// Test helpers
// =========================================================================

mod helpers {
    use super::*;

    /// Scripting handles for one spawned virtual transceiver
    pub struct RadioHandles {
        pub cmd_tx: mpsc::Sender<VirtualRadioCommand>,
        pub state_rx: broadcast::Receiver<VirtualRadioStateEvent>,
    }

    /// Connector that spawns a fresh virtual transceiver per connect
    ///
    /// Handles for each spawned radio arrive on the returned channel in
    /// connection order, so tests can script the current radio and watch
    /// replacements appear after a recycle.
    pub fn virtual_radio_connector() -> (
        impl LinkConnector + 'static,
        mpsc::UnboundedReceiver<RadioHandles>,
    ) {
        let (handles_tx, handles_rx) = mpsc::unbounded_channel();
        let connector = move || {
            let (bridge_side, radio_side) = tokio::io::duplex(1024);
            let (cmd_tx, cmd_rx) = mpsc::channel(32);
            let (state_tx, state_rx) = broadcast::channel(64);
            tokio::spawn(run_virtual_radio_task(
                radio_side,
                VirtualTransceiver::new(),
                cmd_rx,
                state_tx,
            ));
            let _ = handles_tx.send(RadioHandles { cmd_tx, state_rx });
            async move { Ok::<_, LinkError>(bridge_side) }
        };
        (connector, handles_rx)
    }

    /// Connector that never finds a radio
    pub fn absent_radio_connector() -> impl LinkConnector + 'static {
        || async { Err::<DuplexStream, LinkError>(LinkError::NoDevice) }
    }

    /// Connector whose streams open fine but never answer the handshake
    ///
    /// The far ends are parked in the returned channel; hold it for the
    /// length of the test so the streams stay open.
    pub fn mute_radio_connector() -> (
        impl LinkConnector + 'static,
        mpsc::UnboundedReceiver<DuplexStream>,
    ) {
        let (held_tx, held_rx) = mpsc::unbounded_channel();
        let connector = move || {
            let (bridge_side, radio_side) = tokio::io::duplex(256);
            let _ = held_tx.send(radio_side);
            async move { Ok::<_, LinkError>(bridge_side) }
        };
        (connector, held_rx)
    }

    /// Bridge configuration with timers short enough for tests
    pub fn fast_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.ptt.settle_ms = 1;
        config.power.poll_interval_ms = 25;
        config.supervisor.base_delay_ms = 10;
        config.supervisor.max_delay_ms = 50;
        config.supervisor.max_retries = 2;
        config.supervisor.connect_timeout_ms = 500;
        config.supervisor.handshake_timeout_ms = 200;
        config.supervisor.probe_interval_ms = 25;
        config
    }

    /// A running bridge actor with an attached client
    pub struct TestBridge {
        pub cmd_tx: mpsc::Sender<BridgeCommand>,
        pub client_rx: mpsc::Receiver<Vec<u8>>,
        pub event_rx: mpsc::Receiver<LinkEvent>,
        pub store: StateStore,
        codec: CatCodec,
    }

    pub async fn start_bridge<C>(config: BridgeConfig, connector: C) -> TestBridge
    where
        C: LinkConnector + 'static,
    {
        let store = StateStore::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(256);
        tokio::spawn(run_bridge_actor(
            connector,
            store.clone(),
            config,
            cmd_tx.clone(),
            cmd_rx,
            event_tx,
        ));

        let (client_tx, client_rx) = mpsc::channel(64);
        cmd_tx
            .send(BridgeCommand::ClientAttached {
                tx: client_tx,
                peer: "test client".to_string(),
            })
            .await
            .expect("bridge actor gone");

        TestBridge {
            cmd_tx,
            client_rx,
            event_rx,
            store,
            codec: CatCodec::new(),
        }
    }

    pub async fn client_sends(bridge: &TestBridge, bytes: &[u8]) {
        bridge
            .cmd_tx
            .send(BridgeCommand::ClientData {
                data: bytes.to_vec(),
            })
            .await
            .expect("bridge actor gone");
    }

    /// Next complete frame addressed to the client
    pub async fn next_client_frame(bridge: &mut TestBridge) -> Vec<u8> {
        loop {
            if let Some(frame) = bridge.codec.next_frame() {
                return frame;
            }
            let chunk = timeout(Duration::from_secs(2), bridge.client_rx.recv())
                .await
                .expect("timed out waiting for bytes to the client")
                .expect("client channel closed");
            bridge.codec.push_bytes(&chunk);
        }
    }

    /// Send one frame and assert the next reply to it
    pub async fn expect_reply(bridge: &mut TestBridge, send: &[u8], want: &[u8]) {
        client_sends(bridge, send).await;
        let got = next_client_frame(bridge).await;
        assert_eq!(
            got,
            want,
            "reply to {:?}",
            String::from_utf8_lossy(send)
        );
    }

    /// Discard frames to the client until `want` arrives
    pub async fn wait_for_client_frame(bridge: &mut TestBridge, want: &[u8]) {
        loop {
            if next_client_frame(bridge).await == want {
                return;
            }
        }
    }

    /// First bridge event matching `pred`, discarding the rest
    pub async fn wait_for_event(
        bridge: &mut TestBridge,
        what: &str,
        mut pred: impl FnMut(&LinkEvent) -> bool,
    ) -> LinkEvent {
        timeout(Duration::from_secs(5), async {
            loop {
                let event = bridge.event_rx.recv().await.expect("event channel closed");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
    }

    /// First radio state event matching `pred`, discarding the rest
    pub async fn wait_for_radio_state(
        state_rx: &mut broadcast::Receiver<VirtualRadioStateEvent>,
        what: &str,
        mut pred: impl FnMut(&VirtualRadioStateEvent) -> bool,
    ) -> VirtualRadioStateEvent {
        timeout(Duration::from_secs(5), async {
            loop {
                match state_rx.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        panic!("radio state channel closed waiting for {what}")
                    }
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
    }

    pub async fn next_radio(
        handles_rx: &mut mpsc::UnboundedReceiver<RadioHandles>,
    ) -> RadioHandles {
        timeout(Duration::from_secs(5), handles_rx.recv())
            .await
            .expect("timed out waiting for a radio to spawn")
            .expect("connector dropped")
    }

    pub async fn wait_for_link_up(bridge: &mut TestBridge) {
        wait_for_event(bridge, "link up", |e| {
            matches!(
                e,
                LinkEvent::StateChanged {
                    to: ConnectionState::Connected,
                    ..
                }
            )
        })
        .await;
    }
}

// =========================================================================
// Radio emulation toward the client
// =========================================================================

mod emulation_tests {
    use super::helpers::*;
    use super::*;

    /// Slow the hardware probe so an absent radio parks in `Failed`
    /// instead of cycling events for the whole test
    fn parked_config() -> BridgeConfig {
        let mut config = fast_config();
        config.supervisor.probe_interval_ms = 60_000;
        config
    }

    #[tokio::test]
    async fn queries_answered_while_the_radio_is_absent() {
        let mut bridge = start_bridge(parked_config(), absent_radio_connector()).await;

        expect_reply(&mut bridge, b"FA;", b"FA00014074000;").await;
        expect_reply(&mut bridge, b"FB;", b"FB00007074000;").await;
        expect_reply(&mut bridge, b"MD;", b"MD2;").await;
        expect_reply(&mut bridge, b"ID;", b"ID020;").await;
        expect_reply(&mut bridge, b"PS;", b"PS1;").await;
        expect_reply(&mut bridge, b"RM;", b"RM0000;").await;

        client_sends(&bridge, b"IF;").await;
        let status = next_client_frame(&mut bridge).await;
        assert_eq!(status.len(), 38, "composite status is fixed-width");
        assert!(status.starts_with(b"IF"));
    }

    #[tokio::test]
    async fn unforwardable_verbs_are_rejected_while_the_radio_is_absent() {
        let mut bridge = start_bridge(parked_config(), absent_radio_connector()).await;

        expect_reply(&mut bridge, b"XT1;", b"?;").await;
        expect_reply(&mut bridge, b"MD0;", b"?;").await;
    }

    #[tokio::test]
    async fn sets_update_the_mirror_and_reach_the_radio() {
        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;
        wait_for_link_up(&mut bridge).await;
        let mut radio = next_radio(&mut radios).await;

        client_sends(&bridge, b"FA00007000000;").await;
        wait_for_radio_state(&mut radio.state_rx, "dial moved", |s| {
            s.frequency_hz == 7_000_000
        })
        .await;

        assert_eq!(bridge.store.vfo_frequency_hz(Vfo::A), 7_000_000);
        expect_reply(&mut bridge, b"FA;", b"FA00007000000;").await;
    }

    #[tokio::test]
    async fn forwarded_meter_read_reaches_the_radio() {
        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;
        wait_for_link_up(&mut bridge).await;
        let mut radio = next_radio(&mut radios).await;

        client_sends(&bridge, b"TX0;").await;
        wait_for_radio_state(&mut radio.state_rx, "radio keyed", |s| s.transmitting).await;

        // only the radio can know the live reading, so this answer
        // proves the verb crossed the link
        expect_reply(&mut bridge, b"RM;", b"RM0050;").await;
    }

    #[tokio::test]
    async fn auto_info_relays_front_panel_changes() {
        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;
        wait_for_link_up(&mut bridge).await;
        let radio = next_radio(&mut radios).await;

        client_sends(&bridge, b"AI2;").await;
        // the round-trip pins the toggle before the report is scripted
        expect_reply(&mut bridge, b"AI;", b"AI2;").await;

        radio
            .cmd_tx
            .send(VirtualRadioCommand::SetFrequency {
                vfo: Vfo::A,
                hz: 21_074_000,
            })
            .await
            .expect("radio task gone");

        wait_for_client_frame(&mut bridge, b"FA00021074000;").await;
        assert_eq!(bridge.store.vfo_frequency_hz(Vfo::A), 21_074_000);
    }

    #[tokio::test]
    async fn front_panel_changes_stay_quiet_without_auto_info() {
        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;
        wait_for_link_up(&mut bridge).await;
        let radio = next_radio(&mut radios).await;

        radio
            .cmd_tx
            .send(VirtualRadioCommand::SetMode(
                qrp_protocol::OperatingMode::Cw,
            ))
            .await
            .expect("radio task gone");

        // the change never reaches the client, but a query still answers
        // from whatever the mirror last learned
        expect_reply(&mut bridge, b"FA;", b"FA00014074000;").await;
        assert!(
            bridge.client_rx.try_recv().is_err(),
            "no unsolicited reports with auto-information off"
        );
    }
}

// =========================================================================
// Keying sequences
// =========================================================================

mod ptt_tests {
    use super::helpers::*;
    use super::*;

    #[tokio::test]
    async fn cat_keying_sequences_the_radio_in_order() {
        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;
        wait_for_link_up(&mut bridge).await;
        let mut radio = next_radio(&mut radios).await;

        client_sends(&bridge, b"TX0;").await;

        let audio_up =
            wait_for_radio_state(&mut radio.state_rx, "audio path up", |s| s.audio_path).await;
        assert!(
            !audio_up.transmitting,
            "audio path must be up before transmit starts"
        );

        let keyed =
            wait_for_radio_state(&mut radio.state_rx, "radio keyed", |s| s.transmitting).await;
        assert!(keyed.audio_path);
        assert!(bridge.store.transmitting());

        client_sends(&bridge, b"RX;").await;

        let unkeyed =
            wait_for_radio_state(&mut radio.state_rx, "radio unkeyed", |s| !s.transmitting).await;
        assert!(
            unkeyed.audio_path,
            "transmit must stop before the audio path drops"
        );

        let audio_down =
            wait_for_radio_state(&mut radio.state_rx, "audio path down", |s| !s.audio_path).await;
        assert!(!audio_down.transmitting);
        assert!(!bridge.store.transmitting());
    }

    #[tokio::test]
    async fn vox_keys_and_the_hang_timer_releases() {
        let mut config = fast_config();
        config.ptt.vox_hang_ms = 50;

        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(config, connector).await;
        wait_for_link_up(&mut bridge).await;
        let mut radio = next_radio(&mut radios).await;

        bridge
            .cmd_tx
            .send(BridgeCommand::AudioLevel { level: 0.4 })
            .await
            .expect("bridge actor gone");

        wait_for_radio_state(&mut radio.state_rx, "vox keyed", |s| s.transmitting).await;

        // no further audio, so the hang timer runs out on its own
        wait_for_radio_state(&mut radio.state_rx, "vox released", |s| !s.transmitting).await;
        wait_for_radio_state(&mut radio.state_rx, "audio path down", |s| !s.audio_path).await;
    }

    #[tokio::test]
    async fn hardware_ptt_line_keys_and_releases() {
        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;
        wait_for_link_up(&mut bridge).await;
        let mut radio = next_radio(&mut radios).await;

        bridge
            .cmd_tx
            .send(BridgeCommand::PttLine { asserted: true })
            .await
            .expect("bridge actor gone");
        wait_for_radio_state(&mut radio.state_rx, "line keyed", |s| s.transmitting).await;

        bridge
            .cmd_tx
            .send(BridgeCommand::PttLine { asserted: false })
            .await
            .expect("bridge actor gone");
        wait_for_radio_state(&mut radio.state_rx, "line released", |s| !s.transmitting).await;
    }

    #[tokio::test]
    async fn client_detach_unkeys_the_radio() {
        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;
        wait_for_link_up(&mut bridge).await;
        let mut radio = next_radio(&mut radios).await;

        client_sends(&bridge, b"TX0;").await;
        wait_for_radio_state(&mut radio.state_rx, "radio keyed", |s| s.transmitting).await;

        bridge
            .cmd_tx
            .send(BridgeCommand::ClientDetached)
            .await
            .expect("bridge actor gone");

        wait_for_radio_state(&mut radio.state_rx, "radio unkeyed", |s| !s.transmitting).await;
        assert!(!bridge.store.transmitting());
    }
}

// =========================================================================
// Power supervision
// =========================================================================

mod power_tests {
    use super::helpers::*;
    use super::*;

    #[tokio::test]
    async fn sustained_zero_power_recycles_the_link() {
        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;
        wait_for_link_up(&mut bridge).await;
        let RadioHandles {
            cmd_tx: radio_cmd,
            mut state_rx,
        } = next_radio(&mut radios).await;

        client_sends(&bridge, b"TX0;").await;
        wait_for_radio_state(&mut state_rx, "radio keyed", |s| s.transmitting).await;

        // the finals go quiet while the radio still reports keyed
        radio_cmd
            .send(VirtualRadioCommand::SetPowerWatts(0.0))
            .await
            .expect("radio task gone");

        let mut warnings = 0;
        let critical = wait_for_event(&mut bridge, "power critical", |e| {
            if matches!(e, LinkEvent::PowerWarning { .. }) {
                warnings += 1;
            }
            matches!(e, LinkEvent::PowerCritical { .. })
        })
        .await;

        assert_eq!(warnings, 2, "two warnings precede the escalation");
        match critical {
            LinkEvent::PowerCritical { consecutive, .. } => assert_eq!(consecutive, 3),
            other => panic!("unexpected event: {other:?}"),
        }

        wait_for_event(&mut bridge, "link recovered", |e| {
            matches!(e, LinkEvent::ReconnectSucceeded { .. })
        })
        .await;
        assert!(
            !bridge.store.transmitting(),
            "a recycled link comes back in receive"
        );
        let _replacement = next_radio(&mut radios).await;
    }

    #[tokio::test]
    async fn healthy_power_raises_no_alarms() {
        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;
        wait_for_link_up(&mut bridge).await;
        let mut radio = next_radio(&mut radios).await;

        client_sends(&bridge, b"TX0;").await;
        wait_for_radio_state(&mut radio.state_rx, "radio keyed", |s| s.transmitting).await;

        // a dozen polls at full output
        tokio::time::sleep(Duration::from_millis(300)).await;

        let mut faults = 0;
        while let Ok(event) = bridge.event_rx.try_recv() {
            if matches!(
                event,
                LinkEvent::PowerWarning { .. } | LinkEvent::PowerCritical { .. }
            ) {
                faults += 1;
            }
        }
        assert_eq!(faults, 0, "5 W while keyed is healthy");
        assert_eq!(bridge.store.last_power_watts(), Some(5.0));
    }
}

// =========================================================================
// Link supervision and reconnection
// =========================================================================

mod reconnect_tests {
    use super::helpers::*;
    use super::*;

    #[tokio::test]
    async fn link_loss_starts_the_ladder_and_recovers() {
        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;
        wait_for_link_up(&mut bridge).await;
        let first = next_radio(&mut radios).await;

        first
            .cmd_tx
            .send(VirtualRadioCommand::Shutdown)
            .await
            .expect("radio task gone");

        wait_for_event(&mut bridge, "reconnect scheduled", |e| {
            matches!(
                e,
                LinkEvent::StateChanged {
                    to: ConnectionState::Reconnecting,
                    ..
                }
            )
        })
        .await;

        // emulation keeps answering through the outage
        expect_reply(&mut bridge, b"FA;", b"FA00014074000;").await;

        let recovered = wait_for_event(&mut bridge, "link recovered", |e| {
            matches!(e, LinkEvent::ReconnectSucceeded { .. })
        })
        .await;
        match recovered {
            LinkEvent::ReconnectSucceeded { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("unexpected event: {other:?}"),
        }
        let _second = next_radio(&mut radios).await;
    }

    #[tokio::test]
    async fn tx_drop_takes_the_fast_path() {
        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;
        wait_for_link_up(&mut bridge).await;
        let RadioHandles {
            cmd_tx: radio_cmd,
            mut state_rx,
        } = next_radio(&mut radios).await;

        client_sends(&bridge, b"TX0;").await;
        wait_for_radio_state(&mut state_rx, "radio keyed", |s| s.transmitting).await;

        radio_cmd
            .send(VirtualRadioCommand::Shutdown)
            .await
            .expect("radio task gone");

        wait_for_event(&mut bridge, "tx drop", |e| {
            matches!(e, LinkEvent::TxDropDetected { .. })
        })
        .await;

        let started = wait_for_event(&mut bridge, "fast-path attempt", |e| {
            matches!(e, LinkEvent::ReconnectStarted { .. })
        })
        .await;
        match started {
            LinkEvent::ReconnectStarted { attempt, delay, .. } => {
                assert_eq!(attempt, 1);
                assert_eq!(delay, Duration::ZERO, "the fast path skips the ladder");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        wait_for_event(&mut bridge, "link recovered", |e| {
            matches!(e, LinkEvent::ReconnectSucceeded { .. })
        })
        .await;
        assert!(!bridge.store.transmitting());
        let _replacement = next_radio(&mut radios).await;
    }

    #[tokio::test]
    async fn retries_exhaust_then_probing_rearms() {
        let mut bridge = start_bridge(fast_config(), absent_radio_connector()).await;

        wait_for_event(&mut bridge, "first failure", |e| {
            matches!(e, LinkEvent::ReconnectFailed { .. })
        })
        .await;

        let exhausted = wait_for_event(&mut bridge, "retry budget spent", |e| {
            matches!(e, LinkEvent::RetriesExhausted { .. })
        })
        .await;
        match exhausted {
            LinkEvent::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("unexpected event: {other:?}"),
        }

        wait_for_event(&mut bridge, "parked in failed", |e| {
            matches!(
                e,
                LinkEvent::StateChanged {
                    to: ConnectionState::Failed,
                    ..
                }
            )
        })
        .await;

        // emulation answers even from the parking lot
        expect_reply(&mut bridge, b"MD;", b"MD2;").await;

        // the closure connector reports hardware present, so the probe
        // re-arms the ladder straight away
        wait_for_event(&mut bridge, "probe re-arm", |e| {
            matches!(
                e,
                LinkEvent::StateChanged {
                    from: ConnectionState::Failed,
                    to: ConnectionState::Reconnecting,
                    ..
                }
            )
        })
        .await;
    }

    #[tokio::test]
    async fn handshake_timeout_counts_as_a_failed_attempt() {
        let (connector, _held_streams) = mute_radio_connector();
        let mut bridge = start_bridge(fast_config(), connector).await;

        let failed = wait_for_event(&mut bridge, "handshake failure", |e| {
            matches!(e, LinkEvent::ReconnectFailed { .. })
        })
        .await;
        match failed {
            LinkEvent::ReconnectFailed { error, .. } => {
                assert!(
                    error.contains("identification"),
                    "unexpected failure reason: {error}"
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn quiet_link_is_recycled() {
        let mut config = fast_config();
        config.supervisor.quiet_timeout_ms = 150;
        // park the poller so nothing keeps the link fed
        config.power.poll_interval_ms = 60_000;

        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(config, connector).await;
        wait_for_link_up(&mut bridge).await;
        let _first = next_radio(&mut radios).await;

        wait_for_event(&mut bridge, "quiet recycle", |e| {
            matches!(
                e,
                LinkEvent::StateChanged {
                    to: ConnectionState::Reconnecting,
                    ..
                }
            )
        })
        .await;

        wait_for_event(&mut bridge, "link recovered", |e| {
            matches!(e, LinkEvent::ReconnectSucceeded { .. })
        })
        .await;
        let _second = next_radio(&mut radios).await;
    }

    #[tokio::test]
    async fn meter_polls_keep_an_idle_link_alive() {
        let mut config = fast_config();
        config.supervisor.quiet_timeout_ms = 200;
        config.power.poll_interval_ms = 50;

        let (connector, mut radios) = virtual_radio_connector();
        let mut bridge = start_bridge(config, connector).await;
        wait_for_link_up(&mut bridge).await;
        let _radio = next_radio(&mut radios).await;

        tokio::time::sleep(Duration::from_millis(600)).await;

        let mut recycles = 0;
        while let Ok(event) = bridge.event_rx.try_recv() {
            if matches!(
                event,
                LinkEvent::StateChanged {
                    to: ConnectionState::Reconnecting,
                    ..
                }
            ) {
                recycles += 1;
            }
        }
        assert_eq!(recycles, 0, "meter replies feed the quiet watchdog");
    }
}

// =========================================================================
// Backoff ladder properties
// =========================================================================

mod backoff_properties {
    use proptest::prelude::*;
    use qrp_link::supervisor::ladder_delay_ms;
    use qrp_link::SupervisorConfig;

    proptest! {
        #[test]
        fn ladder_is_monotone_and_capped(
            base in 1u64..=10_000,
            max in 1u64..=600_000,
            exp in 0u32..=63,
        ) {
            let config = SupervisorConfig {
                base_delay_ms: base,
                max_delay_ms: max,
                ..SupervisorConfig::default()
            };
            prop_assert!(ladder_delay_ms(&config, exp) <= max);
            prop_assert!(ladder_delay_ms(&config, exp) <= ladder_delay_ms(&config, exp + 1));
            prop_assert_eq!(ladder_delay_ms(&config, 0), base.min(max));
        }
    }
}

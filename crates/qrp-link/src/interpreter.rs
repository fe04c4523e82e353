//! CAT frame interpretation
//!
//! Policy for both directions of the bridge. Client frames are answered
//! from the mirrored state, forwarded to the hardware, or routed into
//! the keying sequencer; hardware frames update the mirror and are
//! relayed to the client when appropriate. The functions here only
//! decide; the bridge actor performs the writes, owns the keying
//! sequencer, and gates keying on link health.
//!
//! Queries are always answered locally, even with the hardware away, so
//! control software keeps polling happily across an outage. Set commands
//! update the mirror first and reach the hardware only while the link is
//! up; whatever the radio missed is reconciled when it comes back.

use qrp_protocol::{response, CatCommand, ParseError, Vfo};
use tracing::{debug, trace};

use crate::state::StateStore;

/// What to do with one client frame, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Answer the client from the mirrored state
    Reply(Vec<u8>),
    /// Pass these bytes to the hardware
    Forward(Vec<u8>),
    /// Route a key request through the keying sequencer
    KeyDown,
    /// Route an unkey request through the keying sequencer
    KeyUp,
}

/// What to do with one hardware frame, in order
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareAction {
    /// Pass these bytes to the client
    Relay(Vec<u8>),
    /// A forward power reading arrived
    PowerReading { watts: f32 },
}

/// The `?;` answer for a parse failure, if the failure deserves one
///
/// Known verbs with a bad argument are rejected so the client learns the
/// command went nowhere. Structurally broken frames are dropped without
/// an answer; rejecting those would desynchronize clients that never
/// sent a command at all.
pub fn rejection_for(error: &ParseError) -> Option<Vec<u8>> {
    match error {
        ParseError::InvalidArgument { .. }
        | ParseError::InvalidFrequency(_)
        | ParseError::InvalidMode(_)
        | ParseError::InvalidVfo(_) => Some(response::rejection()),
        ParseError::InvalidFrame(_) | ParseError::InvalidVerb(_) => None,
    }
}

/// Interpret one frame from the control client
///
/// `connected` reflects link health: it gates forwarding and decides
/// whether unemulated verbs pass through or come back rejected. Keying
/// actions are emitted unconditionally; the caller gates those.
pub fn interpret_client_frame(
    store: &StateStore,
    connected: bool,
    frame: &CatCommand,
) -> Vec<ClientAction> {
    match frame {
        // queries answered from the mirror
        CatCommand::FrequencyA(None) => {
            reply(response::frequency(Vfo::A, store.vfo_frequency_hz(Vfo::A)))
        }
        CatCommand::FrequencyB(None) => {
            reply(response::frequency(Vfo::B, store.vfo_frequency_hz(Vfo::B)))
        }
        CatCommand::Mode(None) => reply(response::mode(store.mode())),
        CatCommand::RxVfo(None) => reply(response::rx_vfo(store.active_vfo())),
        CatCommand::TxVfo(None) => reply(response::tx_vfo(store.active_vfo())),
        CatCommand::AutoInfo(None) => reply(response::auto_info(store.auto_info())),
        CatCommand::Id(None) => reply(response::identification()),
        CatCommand::Status(None) => reply(response::status(&store.status_report())),
        CatCommand::PowerStatus(None) => reply(response::power_status(true)),
        CatCommand::AudioPath(None) => {
            // the audio path is up exactly while keyed
            reply(CatCommand::AudioPath(Some(store.transmitting())).encode())
        }
        CatCommand::PowerMeter(None) => {
            if connected {
                vec![ClientAction::Forward(frame.encode())]
            } else {
                let tenths = store
                    .last_power_watts()
                    .map(|w| (w * 10.0).round() as u16)
                    .unwrap_or(0);
                reply(CatCommand::PowerMeter(Some(tenths)).encode())
            }
        }

        // sets update the mirror, reach the hardware while it is there,
        // and echo back when auto-information is on
        CatCommand::FrequencyA(Some(hz)) => {
            store.set_vfo_frequency_hz(Vfo::A, *hz);
            set_actions(store, connected, frame, response::frequency(Vfo::A, *hz))
        }
        CatCommand::FrequencyB(Some(hz)) => {
            store.set_vfo_frequency_hz(Vfo::B, *hz);
            set_actions(store, connected, frame, response::frequency(Vfo::B, *hz))
        }
        CatCommand::Mode(Some(mode)) => {
            store.set_mode(*mode);
            set_actions(store, connected, frame, response::mode(*mode))
        }
        CatCommand::RxVfo(Some(vfo)) => {
            store.set_active_vfo(*vfo);
            set_actions(store, connected, frame, response::rx_vfo(*vfo))
        }
        // the radio family ties transmit VFO to receive VFO
        CatCommand::TxVfo(Some(vfo)) => {
            store.set_active_vfo(*vfo);
            set_actions(store, connected, frame, response::tx_vfo(*vfo))
        }

        // auto-information is bridge state, never the radio's
        CatCommand::AutoInfo(Some(enabled)) => {
            debug!("auto-information {}", if *enabled { "on" } else { "off" });
            store.set_auto_info(*enabled);
            Vec::new()
        }

        // keying entry points
        CatCommand::Transmit(_) => vec![ClientAction::KeyDown],
        CatCommand::Receive => vec![ClientAction::KeyUp],
        CatCommand::AudioPath(Some(true)) => vec![ClientAction::KeyDown],
        CatCommand::AudioPath(Some(false)) => vec![ClientAction::KeyUp],

        // streamed audio passes through while the radio is there
        CatCommand::AudioBlock(_) => {
            if connected {
                vec![ClientAction::Forward(frame.encode())]
            } else {
                Vec::new()
            }
        }

        // report forms arriving from the wrong direction
        CatCommand::Id(Some(_))
        | CatCommand::Status(Some(_))
        | CatCommand::PowerStatus(Some(_))
        | CatCommand::PowerMeter(Some(_))
        | CatCommand::Rejected => {
            trace!("dropping report-form frame from client: {frame:?}");
            Vec::new()
        }

        CatCommand::Unknown(raw) => {
            if connected {
                vec![ClientAction::Forward(raw.clone())]
            } else {
                reply(response::rejection())
            }
        }
    }
}

fn reply(bytes: Vec<u8>) -> Vec<ClientAction> {
    vec![ClientAction::Reply(bytes)]
}

fn set_actions(
    store: &StateStore,
    connected: bool,
    frame: &CatCommand,
    report: Vec<u8>,
) -> Vec<ClientAction> {
    let mut actions = Vec::new();
    if connected {
        actions.push(ClientAction::Forward(frame.encode()));
    }
    if store.auto_info() {
        actions.push(ClientAction::Reply(report));
    }
    actions
}

/// Interpret one frame from the hardware
///
/// Reports refresh the mirror. The keyed flag is deliberately excluded:
/// the keying sequencer owns it, and a stale composite report must not
/// flip it behind the sequencer's back. Reports are relayed to the
/// client only when auto-information is on; relays are rebuilt from the
/// mirror so the client always sees the bridge's view.
pub fn interpret_hardware_frame(store: &StateStore, frame: &CatCommand) -> Vec<HardwareAction> {
    match frame {
        CatCommand::FrequencyA(Some(hz)) => {
            store.set_vfo_frequency_hz(Vfo::A, *hz);
            relay_if_auto_info(store, response::frequency(Vfo::A, *hz))
        }
        CatCommand::FrequencyB(Some(hz)) => {
            store.set_vfo_frequency_hz(Vfo::B, *hz);
            relay_if_auto_info(store, response::frequency(Vfo::B, *hz))
        }
        CatCommand::Mode(Some(mode)) => {
            store.set_mode(*mode);
            relay_if_auto_info(store, response::mode(*mode))
        }
        CatCommand::RxVfo(Some(vfo)) => {
            store.set_active_vfo(*vfo);
            relay_if_auto_info(store, response::rx_vfo(*vfo))
        }
        CatCommand::TxVfo(Some(vfo)) => {
            store.set_active_vfo(*vfo);
            relay_if_auto_info(store, response::tx_vfo(*vfo))
        }
        CatCommand::Status(Some(report)) => {
            store.set_active_vfo(report.active_vfo);
            store.set_vfo_frequency_hz(report.active_vfo, report.frequency_hz);
            store.set_mode(report.mode);
            relay_if_auto_info(store, response::status(&store.status_report()))
        }

        CatCommand::PowerMeter(Some(tenths)) => {
            let watts = *tenths as f32 / 10.0;
            store.set_last_power_watts(watts);
            vec![HardwareAction::PowerReading { watts }]
        }

        // audio is never held back
        CatCommand::AudioBlock(_) => vec![HardwareAction::Relay(frame.encode())],

        // answers to forwarded verbs the bridge does not model
        CatCommand::Unknown(raw) => vec![HardwareAction::Relay(raw.clone())],
        CatCommand::Rejected => vec![HardwareAction::Relay(response::rejection())],

        // identification is consumed by the handshake path; queries and
        // keying verbs have no business arriving from the radio
        CatCommand::Id(_)
        | CatCommand::AutoInfo(_)
        | CatCommand::PowerStatus(_)
        | CatCommand::Transmit(_)
        | CatCommand::Receive
        | CatCommand::AudioPath(_)
        | CatCommand::FrequencyA(None)
        | CatCommand::FrequencyB(None)
        | CatCommand::Mode(None)
        | CatCommand::RxVfo(None)
        | CatCommand::TxVfo(None)
        | CatCommand::Status(None)
        | CatCommand::PowerMeter(None) => {
            trace!("dropping hardware frame: {frame:?}");
            Vec::new()
        }
    }
}

fn relay_if_auto_info(store: &StateStore, bytes: Vec<u8>) -> Vec<HardwareAction> {
    if store.auto_info() {
        vec![HardwareAction::Relay(bytes)]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrp_protocol::{parse_frame, OperatingMode, StatusReport};

    fn interpret(store: &StateStore, connected: bool, raw: &[u8]) -> Vec<ClientAction> {
        interpret_client_frame(store, connected, &parse_frame(raw).unwrap())
    }

    fn from_radio(store: &StateStore, raw: &[u8]) -> Vec<HardwareAction> {
        interpret_hardware_frame(store, &parse_frame(raw).unwrap())
    }

    #[test]
    fn test_queries_answered_from_mirror() {
        let store = StateStore::default();
        assert_eq!(
            interpret(&store, true, b"FA;"),
            vec![ClientAction::Reply(b"FA00014074000;".to_vec())]
        );
        assert_eq!(
            interpret(&store, true, b"FB;"),
            vec![ClientAction::Reply(b"FB00007074000;".to_vec())]
        );
        assert_eq!(
            interpret(&store, true, b"MD;"),
            vec![ClientAction::Reply(b"MD2;".to_vec())]
        );
        assert_eq!(
            interpret(&store, true, b"ID;"),
            vec![ClientAction::Reply(b"ID020;".to_vec())]
        );
        assert_eq!(
            interpret(&store, true, b"PS;"),
            vec![ClientAction::Reply(b"PS1;".to_vec())]
        );
        assert_eq!(
            interpret(&store, true, b"AI;"),
            vec![ClientAction::Reply(b"AI0;".to_vec())]
        );
    }

    #[test]
    fn test_queries_survive_an_outage() {
        let store = StateStore::default();
        // same answers with the hardware away
        assert_eq!(
            interpret(&store, false, b"FA;"),
            vec![ClientAction::Reply(b"FA00014074000;".to_vec())]
        );
        let status = interpret(&store, false, b"IF;");
        match &status[..] {
            [ClientAction::Reply(bytes)] => assert_eq!(bytes.len(), 38),
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[test]
    fn test_set_updates_mirror_and_forwards() {
        let store = StateStore::default();
        let actions = interpret(&store, true, b"FA00021074000;");
        assert_eq!(
            actions,
            vec![ClientAction::Forward(b"FA00021074000;".to_vec())]
        );
        assert_eq!(store.vfo_frequency_hz(Vfo::A), 21_074_000);
    }

    #[test]
    fn test_set_while_down_updates_mirror_only() {
        let store = StateStore::default();
        let actions = interpret(&store, false, b"MD3;");
        assert!(actions.is_empty());
        assert_eq!(store.mode(), OperatingMode::Cw);
    }

    #[test]
    fn test_set_echoes_report_when_auto_info_on() {
        let store = StateStore::default();
        store.set_auto_info(true);
        let actions = interpret(&store, true, b"FA00021074000;");
        assert_eq!(
            actions,
            vec![
                ClientAction::Forward(b"FA00021074000;".to_vec()),
                ClientAction::Reply(b"FA00021074000;".to_vec()),
            ]
        );
    }

    #[test]
    fn test_auto_info_set_is_local_and_silent() {
        let store = StateStore::default();
        assert!(interpret(&store, true, b"AI2;").is_empty());
        assert!(store.auto_info());
        assert_eq!(
            interpret(&store, true, b"AI;"),
            vec![ClientAction::Reply(b"AI2;".to_vec())]
        );
        assert!(interpret(&store, true, b"AI0;").is_empty());
        assert!(!store.auto_info());
    }

    #[test]
    fn test_tx_vfo_set_moves_the_active_vfo() {
        let store = StateStore::default();
        interpret(&store, true, b"FT1;");
        assert_eq!(store.active_vfo(), Vfo::B);
        assert_eq!(
            interpret(&store, true, b"FR;"),
            vec![ClientAction::Reply(b"FR1;".to_vec())]
        );
    }

    #[test]
    fn test_keying_entry_points() {
        let store = StateStore::default();
        assert_eq!(interpret(&store, true, b"TX;"), vec![ClientAction::KeyDown]);
        assert_eq!(
            interpret(&store, true, b"TX0;"),
            vec![ClientAction::KeyDown]
        );
        assert_eq!(interpret(&store, true, b"RX;"), vec![ClientAction::KeyUp]);
        assert_eq!(
            interpret(&store, true, b"UA1;"),
            vec![ClientAction::KeyDown]
        );
        assert_eq!(interpret(&store, true, b"UA0;"), vec![ClientAction::KeyUp]);
    }

    #[test]
    fn test_audio_path_query_tracks_keyed_state() {
        let store = StateStore::default();
        assert_eq!(
            interpret(&store, true, b"UA;"),
            vec![ClientAction::Reply(b"UA0;".to_vec())]
        );
        store.set_transmitting(true);
        assert_eq!(
            interpret(&store, true, b"UA;"),
            vec![ClientAction::Reply(b"UA1;".to_vec())]
        );
    }

    #[test]
    fn test_power_meter_query_forwards_when_up() {
        let store = StateStore::default();
        assert_eq!(
            interpret(&store, true, b"RM;"),
            vec![ClientAction::Forward(b"RM;".to_vec())]
        );
    }

    #[test]
    fn test_power_meter_query_served_from_mirror_when_down() {
        let store = StateStore::default();
        assert_eq!(
            interpret(&store, false, b"RM;"),
            vec![ClientAction::Reply(b"RM0000;".to_vec())]
        );
        store.set_last_power_watts(4.2);
        assert_eq!(
            interpret(&store, false, b"RM;"),
            vec![ClientAction::Reply(b"RM0042;".to_vec())]
        );
    }

    #[test]
    fn test_unknown_verb_forwards_when_up_rejects_when_down() {
        let store = StateStore::default();
        assert_eq!(
            interpret(&store, true, b"XT1;"),
            vec![ClientAction::Forward(b"XT1;".to_vec())]
        );
        assert_eq!(
            interpret(&store, false, b"XT1;"),
            vec![ClientAction::Reply(b"?;".to_vec())]
        );
    }

    #[test]
    fn test_client_audio_block_forwards_when_up_drops_when_down() {
        let store = StateStore::default();
        let frame = b"US\x03a;b;";
        assert_eq!(
            interpret(&store, true, frame),
            vec![ClientAction::Forward(frame.to_vec())]
        );
        assert!(interpret(&store, false, frame).is_empty());
    }

    #[test]
    fn test_report_forms_from_client_are_dropped() {
        let store = StateStore::default();
        assert!(interpret(&store, true, b"ID020;").is_empty());
        assert!(interpret(&store, true, b"PS1;").is_empty());
        assert!(interpret(&store, true, b"RM0042;").is_empty());
        assert!(interpret(&store, true, b"?;").is_empty());
    }

    #[test]
    fn test_rejection_policy_for_parse_failures() {
        let bad_arg = parse_frame(b"MD0;").unwrap_err();
        assert_eq!(rejection_for(&bad_arg), Some(b"?;".to_vec()));

        let bad_freq = parse_frame(b"FA12ab;").unwrap_err();
        assert_eq!(rejection_for(&bad_freq), Some(b"?;".to_vec()));

        let broken = parse_frame(b"123;").unwrap_err();
        assert_eq!(rejection_for(&broken), None);
    }

    #[test]
    fn test_hardware_report_updates_mirror_silently() {
        let store = StateStore::default();
        let actions = from_radio(&store, b"FA00018100000;");
        assert!(actions.is_empty());
        assert_eq!(store.vfo_frequency_hz(Vfo::A), 18_100_000);
    }

    #[test]
    fn test_hardware_report_relays_when_auto_info_on() {
        let store = StateStore::default();
        store.set_auto_info(true);
        let actions = from_radio(&store, b"MD1;");
        assert_eq!(actions, vec![HardwareAction::Relay(b"MD1;".to_vec())]);
        assert_eq!(store.mode(), OperatingMode::Lsb);
    }

    #[test]
    fn test_hardware_status_never_touches_keyed_flag() {
        let store = StateStore::default();
        let report = StatusReport {
            frequency_hz: 7_030_000,
            mode: OperatingMode::Cw,
            active_vfo: Vfo::B,
            transmitting: true,
        };
        interpret_hardware_frame(&store, &CatCommand::Status(Some(report)));

        assert!(!store.transmitting());
        assert_eq!(store.active_vfo(), Vfo::B);
        assert_eq!(store.vfo_frequency_hz(Vfo::B), 7_030_000);
        assert_eq!(store.mode(), OperatingMode::Cw);
    }

    #[test]
    fn test_hardware_power_reading_updates_mirror() {
        let store = StateStore::default();
        let actions = from_radio(&store, b"RM0048;");
        assert_eq!(actions, vec![HardwareAction::PowerReading { watts: 4.8 }]);
        assert_eq!(store.last_power_watts(), Some(4.8));
    }

    #[test]
    fn test_hardware_audio_relays_regardless_of_auto_info() {
        let store = StateStore::default();
        let frame = b"US\x02hi;";
        assert_eq!(
            from_radio(&store, frame),
            vec![HardwareAction::Relay(frame.to_vec())]
        );
    }

    #[test]
    fn test_hardware_unknown_reply_relays_verbatim() {
        let store = StateStore::default();
        assert_eq!(
            from_radio(&store, b"XT1;"),
            vec![HardwareAction::Relay(b"XT1;".to_vec())]
        );
        assert_eq!(
            from_radio(&store, b"?;"),
            vec![HardwareAction::Relay(b"?;".to_vec())]
        );
    }

    #[test]
    fn test_hardware_identification_is_consumed() {
        let store = StateStore::default();
        assert!(from_radio(&store, b"ID020;").is_empty());
    }
}

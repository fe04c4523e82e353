//! Response builders for the emulated radio
//!
//! Every byte string the bridge sends back to control software is built
//! here. Most responses are ordinary variable-free encodings; the
//! composite status report is special: downstream parsers validate its
//! total length strictly, so it is built against `STATUS_RESPONSE_LEN`
//! and padded or truncated to match, whatever state it encodes. Two
//! formats differing by two characters have historically circulated and
//! the longer one breaks at least one strict parser; 38 is canonical.

use crate::command::{CatCommand, OperatingMode, StatusReport, Vfo};

/// Total length of the composite status response: prefix + payload +
/// terminator. Fixed; see the property test.
pub const STATUS_RESPONSE_LEN: usize = 38;

/// Identification string reported to clients (TS-480 family)
pub const RADIO_ID: &str = "020";

/// Identification response: `ID020;`
pub fn identification() -> Vec<u8> {
    format!("ID{};", RADIO_ID).into_bytes()
}

/// Frequency report for one VFO: `FA00007074000;`
pub fn frequency(vfo: Vfo, hz: u64) -> Vec<u8> {
    match vfo {
        Vfo::A => CatCommand::FrequencyA(Some(hz)).encode(),
        Vfo::B => CatCommand::FrequencyB(Some(hz)).encode(),
    }
}

/// Mode report: `MD2;`
pub fn mode(mode: OperatingMode) -> Vec<u8> {
    CatCommand::Mode(Some(mode)).encode()
}

/// Receive VFO report: `FR0;`
pub fn rx_vfo(vfo: Vfo) -> Vec<u8> {
    CatCommand::RxVfo(Some(vfo)).encode()
}

/// Transmit VFO report: `FT0;`
pub fn tx_vfo(vfo: Vfo) -> Vec<u8> {
    CatCommand::TxVfo(Some(vfo)).encode()
}

/// Auto-information report: `AI0;` or `AI2;`
pub fn auto_info(enabled: bool) -> Vec<u8> {
    CatCommand::AutoInfo(Some(enabled)).encode()
}

/// Power status report: `PS0;` or `PS1;`
pub fn power_status(on: bool) -> Vec<u8> {
    CatCommand::PowerStatus(Some(on)).encode()
}

/// The documented no-op answer for commands that cannot be served: `?;`
pub fn rejection() -> Vec<u8> {
    CatCommand::Rejected.encode()
}

/// Composite status report, always exactly `STATUS_RESPONSE_LEN` bytes
///
/// Payload layout after the `IF` prefix: 11-digit frequency, 5 spaces,
/// signed 5-char RIT offset, RIT/XIT flags, memory bank, 2-digit channel,
/// keyed flag, mode digit, VFO digit, scan, split, tone mode, 2-digit
/// tone number, shift.
pub fn status(report: &StatusReport) -> Vec<u8> {
    let mut out = format!(
        "IF{freq:011}{step:5}{rit:+05}{rit_on}{xit_on}{bank}{channel:02}{tx}{mode}{vfo}{scan}{split}{tone_mode}{tone:02}{shift}",
        freq = report.frequency_hz,
        step = "",
        rit = 0,
        rit_on = 0,
        xit_on = 0,
        bank = 0,
        channel = 0,
        tx = if report.transmitting { 1 } else { 0 },
        mode = report.mode.digit(),
        vfo = report.active_vfo.digit(),
        scan = 0,
        split = 0,
        tone_mode = 0,
        tone = 0,
        shift = 0,
    );

    // Enforce the canonical total length no matter what the state encodes
    out.truncate(STATUS_RESPONSE_LEN - 1);
    while out.len() < STATUS_RESPONSE_LEN - 1 {
        out.push('0');
    }
    out.push(';');
    out.into_bytes()
}

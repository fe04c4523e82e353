//! CAT command model
//!
//! Parsed representation of the semicolon-terminated command stream spoken
//! on both sides of the bridge: the control software side (queries, sets,
//! keying) and the transceiver side (reports, power readings, audio
//! blocks). Verbs are two ASCII letters in the vast majority of cases; the
//! handful of single-letter verbs are never emulated and pass through as
//! `Unknown`.

use crate::error::ParseError;

/// Operating modes of the transceiver, one wire digit each
///
/// The wire encoding is the Kenwood mode digit: `MD2;` selects USB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperatingMode {
    /// Lower Sideband
    Lsb,
    /// Upper Sideband
    Usb,
    /// Continuous Wave
    Cw,
    /// Frequency Modulation
    Fm,
    /// Amplitude Modulation
    Am,
    /// Frequency Shift Keying (RTTY)
    Fsk,
    /// CW Reverse
    CwR,
    /// Data, lower sideband
    DataL,
    /// FSK Reverse
    FskR,
}

impl OperatingMode {
    /// Parse a Kenwood mode digit (1-9)
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(Self::Lsb),
            2 => Some(Self::Usb),
            3 => Some(Self::Cw),
            4 => Some(Self::Fm),
            5 => Some(Self::Am),
            6 => Some(Self::Fsk),
            7 => Some(Self::CwR),
            8 => Some(Self::DataL),
            9 => Some(Self::FskR),
            _ => None,
        }
    }

    /// The Kenwood mode digit for this mode
    pub fn digit(self) -> u8 {
        match self {
            Self::Lsb => 1,
            Self::Usb => 2,
            Self::Cw => 3,
            Self::Fm => 4,
            Self::Am => 5,
            Self::Fsk => 6,
            Self::CwR => 7,
            Self::DataL => 8,
            Self::FskR => 9,
        }
    }

    /// Returns whether this is a voice mode
    pub fn is_voice(&self) -> bool {
        matches!(self, Self::Lsb | Self::Usb | Self::Am | Self::Fm)
    }

    /// Returns whether this is a data mode
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Fsk | Self::FskR | Self::DataL)
    }

    /// Returns whether this is a CW mode
    pub fn is_cw(&self) -> bool {
        matches!(self, Self::Cw | Self::CwR)
    }

    /// Human-readable mode name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lsb => "LSB",
            Self::Usb => "USB",
            Self::Cw => "CW",
            Self::Fm => "FM",
            Self::Am => "AM",
            Self::Fsk => "FSK",
            Self::CwR => "CW-R",
            Self::DataL => "DATA-L",
            Self::FskR => "FSK-R",
        }
    }
}

/// VFO selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Vfo {
    A,
    B,
}

impl Vfo {
    /// Parse a VFO select digit (0 = A, 1 = B)
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Self::A),
            1 => Some(Self::B),
            _ => None,
        }
    }

    /// The wire digit for this VFO
    pub fn digit(self) -> u8 {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// Fields carried by the composite status report (`IF`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusReport {
    /// Active VFO frequency in Hz
    pub frequency_hz: u64,
    /// Operating mode
    pub mode: OperatingMode,
    /// Receive VFO selection
    pub active_vfo: Vfo,
    /// Keyed state
    pub transmitting: bool,
}

/// A parsed CAT command or report
///
/// `Option`-wrapped payloads follow the wire convention: `None` is the
/// bare-verb query form (`FA;`), `Some` is the set/report form
/// (`FA00007074000;`). Set and report are the same bytes on the wire; the
/// direction of travel decides which one it is.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CatCommand {
    /// VFO A frequency: `FA;` or `FA00007074000;`
    FrequencyA(Option<u64>),
    /// VFO B frequency: `FB;` or `FB00007074000;`
    FrequencyB(Option<u64>),
    /// Operating mode: `MD;` or `MD2;`
    Mode(Option<OperatingMode>),
    /// Receive VFO select: `FR;`, `FR0;`, `FR1;`
    RxVfo(Option<Vfo>),
    /// Transmit VFO select: `FT;`, `FT0;`, `FT1;`
    TxVfo(Option<Vfo>),
    /// Auto-information: `AI;`, `AI0;` (off), `AI2;` (on)
    AutoInfo(Option<bool>),
    /// Identification: `ID;` or `ID020;`
    Id(Option<String>),
    /// Composite status: `IF;` or the full fixed-width report
    Status(Option<StatusReport>),
    /// Power on/off status: `PS;`, `PS0;`, `PS1;`
    PowerStatus(Option<bool>),
    /// Key the transmitter: `TX;`, `TX0;`, `TX1;`, `TX2;`
    Transmit(Option<u8>),
    /// Unkey the transmitter: `RX;`
    Receive,
    /// Audio path over the serial link: `UA;`, `UA0;`, `UA1;`
    AudioPath(Option<bool>),
    /// Forward power meter in tenths of a watt: `RM;` or `RM0042;`
    PowerMeter(Option<u16>),
    /// Streamed audio block: `US` + length byte + payload + `;`
    AudioBlock(Vec<u8>),
    /// Command rejection: `?;`
    Rejected,
    /// Unrecognized command, full frame kept verbatim for forwarding
    Unknown(Vec<u8>),
}

impl CatCommand {
    /// Returns whether this is the bare-verb query form
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Self::FrequencyA(None)
                | Self::FrequencyB(None)
                | Self::Mode(None)
                | Self::RxVfo(None)
                | Self::TxVfo(None)
                | Self::AutoInfo(None)
                | Self::Id(None)
                | Self::Status(None)
                | Self::PowerStatus(None)
                | Self::AudioPath(None)
                | Self::PowerMeter(None)
        )
    }

    /// Returns whether this command affects the transmit or audio-path state
    ///
    /// These are never answered or forwarded by the interpreter directly;
    /// they route through the PTT orchestrator.
    pub fn is_transmit_control(&self) -> bool {
        matches!(self, Self::Transmit(_) | Self::Receive | Self::AudioPath(_))
    }

    /// Encode this command for the wire
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::AudioBlock(data) => {
                // one length byte on the wire
                let n = data.len().min(255);
                let mut out = Vec::with_capacity(n + 4);
                out.extend_from_slice(b"US");
                out.push(n as u8);
                out.extend_from_slice(&data[..n]);
                out.push(b';');
                out
            }
            Self::Unknown(raw) => raw.clone(),
            other => {
                let cmd = match other {
                    Self::FrequencyA(Some(hz)) => format!("FA{:011}", hz),
                    Self::FrequencyA(None) => "FA".to_string(),
                    Self::FrequencyB(Some(hz)) => format!("FB{:011}", hz),
                    Self::FrequencyB(None) => "FB".to_string(),
                    Self::Mode(Some(mode)) => format!("MD{}", mode.digit()),
                    Self::Mode(None) => "MD".to_string(),
                    Self::RxVfo(Some(vfo)) => format!("FR{}", vfo.digit()),
                    Self::RxVfo(None) => "FR".to_string(),
                    Self::TxVfo(Some(vfo)) => format!("FT{}", vfo.digit()),
                    Self::TxVfo(None) => "FT".to_string(),
                    Self::AutoInfo(Some(enabled)) => {
                        format!("AI{}", if *enabled { 2 } else { 0 })
                    }
                    Self::AutoInfo(None) => "AI".to_string(),
                    Self::Id(Some(id)) => format!("ID{}", id),
                    Self::Id(None) => "ID".to_string(),
                    // status reports are built by the response module
                    Self::Status(_) => "IF".to_string(),
                    Self::PowerStatus(Some(on)) => format!("PS{}", if *on { 1 } else { 0 }),
                    Self::PowerStatus(None) => "PS".to_string(),
                    Self::Transmit(Some(source)) => format!("TX{}", source),
                    Self::Transmit(None) => "TX".to_string(),
                    Self::Receive => "RX".to_string(),
                    Self::AudioPath(Some(on)) => format!("UA{}", if *on { 1 } else { 0 }),
                    Self::AudioPath(None) => "UA".to_string(),
                    Self::PowerMeter(Some(tenths)) => format!("RM{:04}", tenths),
                    Self::PowerMeter(None) => "RM".to_string(),
                    Self::Rejected => "?".to_string(),
                    Self::AudioBlock(_) | Self::Unknown(_) => unreachable!(),
                };
                format!("{};", cmd).into_bytes()
            }
        }
    }
}

/// Parse one complete frame, terminator included
pub fn parse_frame(frame: &[u8]) -> Result<CatCommand, ParseError> {
    let body = frame
        .strip_suffix(b";")
        .ok_or_else(|| ParseError::InvalidFrame("missing terminator".into()))?;

    if body.is_empty() {
        return Err(ParseError::InvalidFrame("empty command".into()));
    }

    if body == b"?" {
        return Ok(CatCommand::Rejected);
    }

    // Audio blocks carry a length byte so the payload may contain the
    // delimiter; they never go through the text path below.
    if let Some(rest) = body.strip_prefix(b"US") {
        let (&len, payload) = rest
            .split_first()
            .ok_or_else(|| ParseError::InvalidFrame("audio block missing length".into()))?;
        if payload.len() != len as usize {
            return Err(ParseError::InvalidFrame(format!(
                "audio block carries {} bytes, header says {}",
                payload.len(),
                len
            )));
        }
        return Ok(CatCommand::AudioBlock(payload.to_vec()));
    }

    let verb_len = body
        .iter()
        .take(2)
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if verb_len == 0 {
        return Err(ParseError::InvalidVerb(body.to_vec()));
    }
    if verb_len == 1 {
        // single-letter verbs are never emulated locally
        return Ok(CatCommand::Unknown(frame.to_vec()));
    }

    let verb = &body[..2];
    let params = std::str::from_utf8(&body[2..])
        .map_err(|_| ParseError::InvalidFrame("non-ASCII parameters".into()))?;

    match verb {
        b"FA" => Ok(CatCommand::FrequencyA(parse_frequency(params)?)),
        b"FB" => Ok(CatCommand::FrequencyB(parse_frequency(params)?)),
        b"MD" => {
            if params.is_empty() {
                Ok(CatCommand::Mode(None))
            } else {
                let digit = params
                    .parse::<u8>()
                    .ok()
                    .and_then(OperatingMode::from_digit)
                    .ok_or_else(|| ParseError::InvalidMode(params.into()))?;
                Ok(CatCommand::Mode(Some(digit)))
            }
        }
        b"FR" => Ok(CatCommand::RxVfo(parse_vfo(params)?)),
        b"FT" => Ok(CatCommand::TxVfo(parse_vfo(params)?)),
        b"AI" => match params {
            "" => Ok(CatCommand::AutoInfo(None)),
            "0" => Ok(CatCommand::AutoInfo(Some(false))),
            "1" | "2" => Ok(CatCommand::AutoInfo(Some(true))),
            _ => Err(invalid_argument("AI", params)),
        },
        b"ID" => {
            if params.is_empty() {
                Ok(CatCommand::Id(None))
            } else {
                Ok(CatCommand::Id(Some(params.to_string())))
            }
        }
        b"IF" => {
            if params.is_empty() {
                Ok(CatCommand::Status(None))
            } else {
                Ok(CatCommand::Status(Some(parse_status(params)?)))
            }
        }
        b"PS" => match params {
            "" => Ok(CatCommand::PowerStatus(None)),
            "0" => Ok(CatCommand::PowerStatus(Some(false))),
            "1" => Ok(CatCommand::PowerStatus(Some(true))),
            _ => Err(invalid_argument("PS", params)),
        },
        b"TX" => {
            if params.is_empty() {
                Ok(CatCommand::Transmit(None))
            } else {
                let source = params
                    .parse::<u8>()
                    .ok()
                    .filter(|s| *s <= 2)
                    .ok_or_else(|| invalid_argument("TX", params))?;
                Ok(CatCommand::Transmit(Some(source)))
            }
        }
        b"RX" => {
            if params.is_empty() {
                Ok(CatCommand::Receive)
            } else {
                Err(invalid_argument("RX", params))
            }
        }
        b"UA" => match params {
            "" => Ok(CatCommand::AudioPath(None)),
            "0" => Ok(CatCommand::AudioPath(Some(false))),
            "1" => Ok(CatCommand::AudioPath(Some(true))),
            _ => Err(invalid_argument("UA", params)),
        },
        b"RM" => {
            if params.is_empty() {
                Ok(CatCommand::PowerMeter(None))
            } else if params.len() <= 4 && params.bytes().all(|b| b.is_ascii_digit()) {
                // tenths of a watt, four digits
                let tenths = params
                    .parse::<u16>()
                    .map_err(|_| invalid_argument("RM", params))?;
                Ok(CatCommand::PowerMeter(Some(tenths)))
            } else {
                Err(invalid_argument("RM", params))
            }
        }
        _ => Ok(CatCommand::Unknown(frame.to_vec())),
    }
}

fn invalid_argument(verb: &str, params: &str) -> ParseError {
    ParseError::InvalidArgument {
        verb: verb.to_string(),
        argument: params.to_string(),
    }
}

fn parse_frequency(params: &str) -> Result<Option<u64>, ParseError> {
    if params.is_empty() {
        return Ok(None);
    }
    if params.len() > 11 || !params.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidFrequency(params.into()));
    }
    let hz = params
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidFrequency(params.into()))?;
    Ok(Some(hz))
}

fn parse_vfo(params: &str) -> Result<Option<Vfo>, ParseError> {
    if params.is_empty() {
        return Ok(None);
    }
    params
        .parse::<u8>()
        .ok()
        .and_then(Vfo::from_digit)
        .map(Some)
        .ok_or_else(|| ParseError::InvalidVfo(params.into()))
}

/// Parse the parameter block of a composite status report
///
/// Layout after the `IF` prefix: 11-digit frequency, 5 spaces, 5-char
/// RIT offset, RIT/XIT flags, memory bank and channel, keyed flag, mode
/// digit, VFO digit, then scan/split/tone fields we ignore. Reports come
/// from the hardware, so fields beyond the frequency are taken leniently.
fn parse_status(params: &str) -> Result<StatusReport, ParseError> {
    if params.len() < 29 || !params.is_ascii() {
        return Err(ParseError::InvalidFrame(format!(
            "malformed status report ({} chars)",
            params.len()
        )));
    }

    let frequency_hz = params[0..11]
        .trim()
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidFrequency(params[0..11].into()))?;

    let transmitting = params.as_bytes()[26] != b'0';
    let mode = params[27..28]
        .parse::<u8>()
        .ok()
        .and_then(OperatingMode::from_digit)
        .unwrap_or(OperatingMode::Usb);
    let active_vfo = params[28..29]
        .parse::<u8>()
        .ok()
        .and_then(Vfo::from_digit)
        .unwrap_or(Vfo::A);

    Ok(StatusReport {
        frequency_hz,
        mode,
        active_vfo,
        transmitting,
    })
}

/// Generate the probe command used to detect a live CAT endpoint
pub fn probe_command() -> Vec<u8> {
    b"ID;".to_vec()
}

/// Check whether a response looks like a valid ID report
pub fn is_valid_id_response(data: &[u8]) -> bool {
    // Valid responses: ID019; ID020; etc.
    if data.len() >= 5 && data.starts_with(b"ID") && data.ends_with(b";") {
        let id_part = &data[2..data.len() - 1];
        id_part.iter().all(|b| b.is_ascii_digit())
    } else {
        false
    }
}

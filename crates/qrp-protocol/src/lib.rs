//! Kenwood-style CAT protocol support for QRP transceiver bridging
//!
//! This crate speaks the semicolon-terminated ASCII control protocol on
//! both sides of a serial bridge: the commands and queries arriving from
//! control software, and the reports, power readings and audio blocks
//! coming back from the transceiver.
//!
//! # Format
//! - Commands: `XXppppp;` where XX is a 1-2 letter verb, ppppp parameters
//! - Responses: same shape as commands
//! - Terminator: `;` (0x3B), except inside length-prefixed audio blocks
//!
//! # Pieces
//! - [`CatCodec`] splits a byte stream into frames, length-aware for
//!   payloads that may contain the terminator
//! - [`parse_frame`] turns one frame into a [`CatCommand`]
//! - [`response`] builds every byte string the emulated radio answers
//!   with, including the fixed-width composite status report

pub mod codec;
pub mod command;
pub mod error;
pub mod response;

pub use codec::{CatCodec, MAX_FRAME_LEN};
pub use command::{
    is_valid_id_response, parse_frame, probe_command, CatCommand, OperatingMode, StatusReport, Vfo,
};
pub use error::ParseError;
pub use response::{RADIO_ID, STATUS_RESPONSE_LEN};

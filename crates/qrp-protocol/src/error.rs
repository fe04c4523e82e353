//! Error types for CAT protocol parsing

use thiserror::Error;

/// Errors that can occur while parsing a CAT frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Frame structure is broken (no terminator, empty body, bad length prefix)
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Verb is not ASCII letters
    #[error("invalid verb in frame: {0:02X?}")]
    InvalidVerb(Vec<u8>),

    /// Frequency argument is not a parsable digit string
    #[error("invalid frequency: {0}")]
    InvalidFrequency(String),

    /// Mode digit is outside the known range
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    /// VFO digit is not 0 or 1
    #[error("invalid VFO: {0}")]
    InvalidVfo(String),

    /// Argument has the wrong shape for an otherwise known verb
    #[error("invalid argument for {verb}: {argument}")]
    InvalidArgument { verb: String, argument: String },
}

//! Error types for the link engine

use thiserror::Error;

/// Errors that can occur on the hardware link
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error on the link
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(#[from] qrp_protocol::ParseError),

    /// Serial port error
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Timed out opening the connection
    #[error("connect timed out after {0}ms")]
    ConnectTimeout(u64),

    /// Timed out waiting for the identification handshake
    #[error("handshake timed out after {0}ms")]
    HandshakeTimeout(u64),

    /// No transceiver found on any candidate port
    #[error("no transceiver detected")]
    NoDevice,

    /// Reconnect attempts exhausted
    #[error("reconnect retries exhausted after {0} attempts")]
    RetriesExhausted(u32),
}

//! Virtual QRP Transceiver Simulation Library
//!
//! This crate provides a simulation layer for testing bridge functionality
//! without physical radio hardware. It includes:
//!
//! - **VirtualTransceiver**: Simulates a transceiver that answers the CAT
//!   command set with protocol-accurate replies
//! - **run_virtual_radio_task**: Async actor that serves a transceiver over
//!   any stream, with scripting commands and broadcast state events
//!
//! # Example
//!
//! ```rust
//! use qrp_sim::VirtualTransceiver;
//!
//! let mut radio = VirtualTransceiver::new();
//!
//! // Query identification the way the bridge handshake does
//! radio.process_frame(b"ID;");
//! assert_eq!(radio.take_output().unwrap(), b"ID020;");
//!
//! // Key the radio, then read the forward power meter
//! radio.process_frame(b"TX0;");
//! radio.process_frame(b"RM;");
//! assert_eq!(radio.take_output().unwrap(), b"RM0050;");
//! ```

pub mod radio;
pub mod radio_task;

pub use radio::{VirtualTransceiver, VirtualTransceiverConfig};
pub use radio_task::{run_virtual_radio_task, VirtualRadioCommand, VirtualRadioStateEvent};

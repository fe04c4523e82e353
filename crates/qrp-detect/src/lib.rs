//! Serial port discovery and CAT probing for QRP transceivers
//!
//! This crate finds the serial port a transceiver is attached to. It
//! enumerates ports, filters them down to known USB-serial bridges, and
//! probes candidates with the CAT identification query.
//!
//! # Example
//!
//! ```rust,no_run
//! use qrp_detect::PortScanner;
//!
//! let scanner = PortScanner::new();
//! let ports = scanner.candidate_ports().unwrap();
//!
//! for port in ports {
//!     println!("Candidate: {}", port.port);
//! }
//! ```

pub mod error;
pub mod probe;
pub mod scanner;
pub mod usb_ids;

pub use error::DetectError;
pub use probe::{find_radio_port, probe_port, ProbeConfig, ProbeResult, RadioProber};
pub use scanner::{PortScanner, ScannerConfig, SerialPortInfo};

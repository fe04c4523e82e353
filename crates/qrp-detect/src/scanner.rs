//! Serial port scanner
//!
//! Enumerates serial ports and narrows them down to plausible
//! transceiver candidates by USB bridge chip.

use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::DetectError;
use crate::usb_ids;

/// One enumerated serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port path, `/dev/ttyUSB0` style on Unix, `COM3` on Windows
    pub port: String,
    /// USB vendor ID for USB-attached ports
    pub vid: Option<u16>,
    /// USB product ID for USB-attached ports
    pub pid: Option<u16>,
    /// Bridge serial number, when the descriptor carries one
    pub serial_number: Option<String>,
    /// Manufacturer string from the USB descriptor
    pub manufacturer: Option<String>,
    /// Product string from the USB descriptor
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Build from the enumeration record
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        let usb = match port_type {
            SerialPortType::UsbPort(usb) => Some(usb),
            _ => None,
        };
        Self {
            port: name,
            vid: usb.map(|u| u.vid),
            pid: usb.map(|u| u.pid),
            serial_number: usb.and_then(|u| u.serial_number.clone()),
            manufacturer: usb.and_then(|u| u.manufacturer.clone()),
            product: usb.and_then(|u| u.product.clone()),
        }
    }

    /// True if this port sits behind a known USB-serial bridge
    pub fn is_known_adapter(&self) -> bool {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => usb_ids::is_known_serial_adapter(vid, pid),
            _ => false,
        }
    }

    /// Human-readable adapter name, if the bridge chip is recognized
    pub fn adapter_name(&self) -> Option<&'static str> {
        self.vid.and_then(usb_ids::adapter_name)
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Skip ports whose path contains any of these substrings
    pub skip_patterns: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            // Bluetooth and debug consoles clutter macOS port lists
            skip_patterns: vec!["Bluetooth".to_string(), "debug".to_string()],
        }
    }
}

/// Serial port scanner
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Scanner with the default skip list
    pub fn new() -> Self {
        Self::with_config(ScannerConfig::default())
    }

    /// Scanner with a custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate all available serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let found: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip(p))
            .collect();

        info!("Enumerated {} serial port(s)", found.len());
        for port in &found {
            debug!(
                "  {} ({})",
                port.port,
                port.adapter_name().unwrap_or("unrecognized bridge"),
            );
        }

        Ok(found)
    }

    /// Enumerate ports behind known USB-serial bridges, stock bridge first
    ///
    /// This is the candidate list the prober walks when looking for a
    /// transceiver. Ports without a recognized bridge chip are excluded;
    /// they can still be opened explicitly by configured port name.
    pub fn candidate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        let mut candidates: Vec<_> = self
            .enumerate_ports()?
            .into_iter()
            .filter(SerialPortInfo::is_known_adapter)
            .collect();

        candidates.sort_by_key(|p| match p.vid {
            Some(vid) if usb_ids::is_stock_bridge(vid) => 0,
            _ => 1,
        });

        Ok(candidates)
    }

    fn should_skip(&self, port: &SerialPortInfo) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

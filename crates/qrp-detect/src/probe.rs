//! CAT probing for transceiver detection
//!
//! Sends the identification query to a serial port and checks the
//! response to decide whether a CAT-capable transceiver is listening.

use std::time::Duration;

use qrp_protocol::{is_valid_id_response, probe_command};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::scanner::{PortScanner, SerialPortInfo};

/// What a successful probe learned about the port
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Transceiver model code from the ID response (e.g., "020")
    pub id: String,
    /// Raw identification bytes as received
    pub raw: Vec<u8>,
}

/// Probe timing configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Timeout for the identification response
    pub timeout: Duration,
    /// Delay after opening a port before writing to it
    pub settle_delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            settle_delay: Duration::from_millis(50),
        }
    }
}

/// Transceiver prober
pub struct RadioProber {
    config: ProbeConfig,
}

impl RadioProber {
    /// Prober with the default timing
    pub fn new() -> Self {
        Self::with_config(ProbeConfig::default())
    }

    /// Prober with custom timing
    pub fn with_config(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Probe a stream for a CAT-capable transceiver
    ///
    /// Writes the identification query and reads until a terminated
    /// response arrives or the timeout expires. Returns `None` if the
    /// other end stays silent or answers with something that is not an
    /// ID report.
    pub async fn probe<S>(&self, stream: &mut S) -> Option<ProbeResult>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let query = probe_command();
        trace!("Sending ID probe");

        if let Err(e) = stream.write_all(&query).await {
            warn!("Could not write ID probe: {}", e);
            return None;
        }

        let mut response = Vec::with_capacity(16);
        let read_result = timeout(self.config.timeout, async {
            let mut buf = [0u8; 64];
            loop {
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    return Ok::<_, std::io::Error>(false);
                }
                response.extend_from_slice(&buf[..n]);
                if response.contains(&b';') {
                    return Ok(true);
                }
            }
        })
        .await;

        match read_result {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                trace!("Stream closed during ID probe");
                return None;
            }
            Ok(Err(e)) => {
                trace!("ID probe read error: {}", e);
                return None;
            }
            Err(_) => {
                trace!("ID probe timeout");
                return None;
            }
        }

        trace!("ID response: {:?}", String::from_utf8_lossy(&response));

        // Take the first terminated frame; anything after it is chatter.
        let end = response.iter().position(|&b| b == b';')?;
        let frame = &response[..=end];

        if is_valid_id_response(frame) {
            let id = String::from_utf8_lossy(&frame[2..frame.len() - 1]).into_owned();
            info!("Identified transceiver ID{}", id);
            Some(ProbeResult { id, raw: response })
        } else {
            debug!("Port answered but not with an ID report");
            None
        }
    }
}

impl Default for RadioProber {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe one named port
///
/// Opens the port at the given baud rate, lets the bridge settle, and
/// runs a single identification probe.
pub async fn probe_port(port_name: &str, baud_rate: u32) -> Option<ProbeResult> {
    use tokio_serial::SerialPortBuilderExt;

    let builder = tokio_serial::new(port_name, baud_rate).timeout(Duration::from_millis(100));
    let mut stream = match builder.open_native_async() {
        Ok(s) => s,
        Err(e) => {
            warn!("Could not open {}: {}", port_name, e);
            return None;
        }
    };
    debug!("Opened {} at {} baud, settling before probe", port_name, baud_rate);

    let prober = RadioProber::new();
    tokio::time::sleep(prober.config.settle_delay).await;
    prober.probe(&mut stream).await
}

/// Scan candidate ports and return the first one with a transceiver attached
///
/// Walks the scanner's candidate list in stock-bridge-first order and
/// probes each port in turn. Ports that fail to open are skipped.
pub async fn find_radio_port(baud_rate: u32) -> Option<(SerialPortInfo, ProbeResult)> {
    let scanner = PortScanner::new();
    let candidates = match scanner.candidate_ports() {
        Ok(ports) => ports,
        Err(e) => {
            warn!("Port scan failed: {}", e);
            return None;
        }
    };

    if candidates.is_empty() {
        debug!("No candidate ports to probe");
        return None;
    }

    for info in candidates {
        if let Some(result) = probe_port(&info.port, baud_rate).await {
            return Some((info, result));
        }
    }

    None
}

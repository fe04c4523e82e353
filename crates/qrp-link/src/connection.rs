//! Link connectors and the link I/O task
//!
//! A [`LinkConnector`] produces a fresh stream to the radio each time the
//! supervisor wants one, which keeps the reconnect machinery independent
//! of what sits on the other end: a serial port, a simulator over
//! `tokio::io::duplex()`, or a test closure. Opened streams run in their
//! own spawned task that shovels bytes to and from the bridge actor over
//! channels.

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use qrp_detect::{find_radio_port, PortScanner};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::actor::BridgeCommand;
use crate::error::LinkError;

/// Produces streams to the radio on demand
///
/// Each reconnect attempt calls [`connect`](Self::connect) for a fresh
/// stream. [`hardware_present`](Self::hardware_present) is the cheap
/// probe used while parked in `Failed`; connectors that cannot tell
/// inherit the default and report the hardware as always present.
pub trait LinkConnector: Send {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a fresh stream to the radio
    fn connect(&mut self) -> impl Future<Output = Result<Self::Stream, LinkError>> + Send;

    /// Check whether the hardware looks reachable without opening it
    fn hardware_present(&mut self) -> impl Future<Output = bool> + Send {
        async { true }
    }
}

/// Any `FnMut` yielding streams is a connector; tests and the simulator
/// plug in this way
impl<F, Fut, S> LinkConnector for F
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<S, LinkError>> + Send,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Stream = S;

    fn connect(&mut self) -> impl Future<Output = Result<S, LinkError>> + Send {
        (self)()
    }
}

/// Connector for a real transceiver on a serial port
///
/// With a fixed port name it opens that port; without one it scans for a
/// known USB-serial bridge and probes the candidates.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port: Option<String>,
    baud_rate: u32,
}

impl SerialConnector {
    pub fn new(port: Option<String>, baud_rate: u32) -> Self {
        Self { port, baud_rate }
    }
}

impl LinkConnector for SerialConnector {
    type Stream = SerialStream;

    fn connect(&mut self) -> impl Future<Output = Result<SerialStream, LinkError>> + Send {
        async move {
            let port = match &self.port {
                Some(port) => port.clone(),
                None => {
                    let (info, probe) = find_radio_port(self.baud_rate)
                        .await
                        .ok_or(LinkError::NoDevice)?;
                    info!("auto-detected radio ID{} on {}", probe.id, info.port);
                    info.port
                }
            };
            let stream = tokio_serial::new(&port, self.baud_rate)
                .timeout(Duration::from_millis(100))
                .open_native_async()?;
            debug!("opened {} at {} baud", port, self.baud_rate);
            Ok(stream)
        }
    }

    fn hardware_present(&mut self) -> impl Future<Output = bool> + Send {
        let target = self.port.clone();
        async move {
            // enumeration is blocking; keep it off the actor task
            let result = tokio::task::spawn_blocking(move || {
                let scanner = PortScanner::new();
                match target {
                    Some(port) => scanner
                        .enumerate_ports()
                        .map(|ports| ports.iter().any(|p| p.port == port)),
                    None => scanner.candidate_ports().map(|ports| !ports.is_empty()),
                }
            })
            .await;
            matches!(result, Ok(Ok(true)))
        }
    }
}

/// Commands for a spawned link I/O task
#[derive(Debug)]
pub enum LinkTaskCommand {
    /// Write these bytes to the radio
    Write(Vec<u8>),
    /// Stop without reporting a loss
    Shutdown,
}

/// Spawn the I/O task for one opened link
///
/// The task reads raw bytes into [`BridgeCommand::LinkData`] and reports
/// failures as [`BridgeCommand::LinkClosed`]. `id` is the connection
/// generation; the actor uses it to ignore messages from superseded
/// links.
pub fn spawn_link_task<S>(
    id: u64,
    stream: S,
    actor_tx: mpsc::Sender<BridgeCommand>,
) -> mpsc::Sender<LinkTaskCommand>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    tokio::spawn(run_link_io(id, stream, actor_tx, cmd_rx));
    cmd_tx
}

async fn run_link_io<S>(
    id: u64,
    mut stream: S,
    actor_tx: mpsc::Sender<BridgeCommand>,
    mut cmd_rx: mpsc::Receiver<LinkTaskCommand>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!("link task {id} started");
    let mut buffer = vec![0u8; 1024];

    let reason = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(LinkTaskCommand::Write(data)) => {
                        if let Err(e) = write_and_flush(&mut stream, &data).await {
                            warn!("link {id} write error: {e}");
                            break Some(format!("write error: {e}"));
                        }
                    }
                    Some(LinkTaskCommand::Shutdown) | None => break None,
                }
            }

            result = tokio::time::timeout(
                Duration::from_millis(100),
                stream.read(&mut buffer)
            ) => {
                match result {
                    Ok(Ok(0)) => break Some("end of stream".to_string()),
                    Ok(Ok(n)) => {
                        let data = buffer[..n].to_vec();
                        if actor_tx
                            .send(BridgeCommand::LinkData { id, data })
                            .await
                            .is_err()
                        {
                            break None;
                        }
                    }
                    Ok(Err(e)) if e.kind() == ErrorKind::WouldBlock => {}
                    Ok(Err(e)) if e.kind() == ErrorKind::ConnectionAborted => {
                        break Some("channel closed".to_string());
                    }
                    Ok(Err(e)) => {
                        warn!("link {id} read error: {e}");
                        break Some(format!("read error: {e}"));
                    }
                    Err(_) => {}
                }
            }
        }
    };

    match reason {
        Some(reason) => {
            let _ = actor_tx.send(BridgeCommand::LinkClosed { id, reason }).await;
        }
        None => debug!("link task {id} shut down"),
    }
}

async fn write_and_flush<S>(stream: &mut S, data: &[u8]) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(data).await?;
    stream.flush().await
}

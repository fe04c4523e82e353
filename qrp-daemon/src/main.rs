//! QRP Link Bridge Daemon
//!
//! Headless service that supervises the serial link to a QRP transceiver
//! and exposes it to control software as raw CAT frames over TCP. One
//! control client is served at a time; the bridge actor keeps answering
//! from its state mirror while the radio is being reconnected.

mod settings;

use anyhow::Context;
use qrp_detect::PortScanner;
use qrp_link::{
    run_bridge_actor, BridgeCommand, LinkConnector, LinkError, SerialConnector, StateStore,
};
use qrp_sim::{run_virtual_radio_task, VirtualRadioCommand, VirtualTransceiver};
use settings::Settings;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line options; everything else comes from the settings file
#[derive(Debug, Default)]
struct CliArgs {
    simulate: bool,
    list_ports: bool,
    port: Option<String>,
    listen: Option<String>,
}

fn print_usage() {
    println!("Usage: qrplinkd [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port <PATH>    Serial port to use (default: scan for a radio)");
    println!("  --listen <ADDR>  TCP listen address (default: 127.0.0.1:4520)");
    println!("  --simulate       Serve a simulated transceiver instead of hardware");
    println!("  --list-ports     List detected serial ports and exit");
    println!("  --help           Show this help");
}

fn parse_args() -> anyhow::Result<Option<CliArgs>> {
    let mut args = CliArgs::default();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--simulate" => args.simulate = true,
            "--list-ports" => args.list_ports = true,
            "--port" => {
                args.port = Some(iter.next().context("--port requires a value")?);
            }
            "--listen" => {
                args.listen = Some(iter.next().context("--listen requires a value")?);
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            other => anyhow::bail!("unknown option: {other} (try --help)"),
        }
    }

    Ok(Some(args))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    // Include all our crates in the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "qrp_daemon=info,qrp_protocol=info,qrp_detect=info,qrp_link=info,qrp_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.list_ports {
        return list_ports();
    }

    let mut settings = Settings::load();
    match Settings::settings_path() {
        Some(path) if path.exists() => info!("Loaded settings from {}", path.display()),
        Some(path) => match settings.save() {
            Ok(()) => info!("Wrote default settings to {}", path.display()),
            Err(e) => warn!("Could not write default settings: {:#}", e),
        },
        None => warn!("Could not determine the settings path; using defaults"),
    }

    if args.simulate {
        settings.simulate = true;
    }
    if let Some(port) = args.port {
        settings.port = Some(port);
    }
    if let Some(listen) = args.listen {
        settings.listen_addr = listen;
    }

    info!("Starting qrplink bridge daemon");

    let store = StateStore::new();
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (event_tx, mut event_rx) = mpsc::channel(64);

    let bridge_task = if settings.simulate {
        info!("Serving a simulated transceiver");
        tokio::spawn(run_bridge_actor(
            simulated_connector(),
            store,
            settings.bridge.clone(),
            cmd_tx.clone(),
            cmd_rx,
            event_tx,
        ))
    } else {
        match &settings.port {
            Some(port) => info!("Using serial port {} at {} baud", port, settings.baud_rate),
            None => info!("Scanning for a radio at {} baud", settings.baud_rate),
        }
        tokio::spawn(run_bridge_actor(
            SerialConnector::new(settings.port.clone(), settings.baud_rate),
            store,
            settings.bridge.clone(),
            cmd_tx.clone(),
            cmd_rx,
            event_tx,
        ))
    };

    // Surface link events in the log
    let event_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if event.is_fault() {
                warn!("{}", event.summary());
            } else {
                info!("{}", event.summary());
            }
        }
    });

    let listener = TcpListener::bind(&settings.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_addr))?;
    info!("Listening for control clients on {}", settings.listen_addr);

    // One control client at a time; extra connections are refused
    let mut active_client: Option<tokio::task::JoinHandle<()>> = None;
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = accepted.context("accept failed")?;
                if active_client.as_ref().is_some_and(|task| !task.is_finished()) {
                    info!("Refusing {}: a control client is already attached", peer);
                    drop(socket);
                    continue;
                }
                info!("Control client connected from {}", peer);
                let client_cmd_tx = cmd_tx.clone();
                active_client = Some(tokio::spawn(async move {
                    serve_client(socket, peer.to_string(), client_cmd_tx).await;
                    info!("Control client {} disconnected", peer);
                }));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    if let Some(task) = active_client {
        task.abort();
    }
    let _ = cmd_tx.send(BridgeCommand::Shutdown).await;
    let _ = bridge_task.await;
    event_task.abort();

    Ok(())
}

/// Bridge one TCP client into the actor until either side goes away
async fn serve_client(socket: TcpStream, peer: String, cmd_tx: mpsc::Sender<BridgeCommand>) {
    let (mut reader, mut writer) = socket.into_split();
    let (client_tx, mut client_rx) = mpsc::channel::<Vec<u8>>(32);

    if cmd_tx
        .send(BridgeCommand::ClientAttached { tx: client_tx, peer })
        .await
        .is_err()
    {
        return;
    }

    let writer_task = tokio::spawn(async move {
        while let Some(data) = client_rx.recv().await {
            if writer.write_all(&data).await.is_err() {
                break;
            }
        }
    });

    let mut buf = [0u8; 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let data = buf[..n].to_vec();
                if cmd_tx.send(BridgeCommand::ClientData { data }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Control client read error: {}", e);
                break;
            }
        }
    }

    let _ = cmd_tx.send(BridgeCommand::ClientDetached).await;
    writer_task.abort();
}

/// Connector that cables the bridge to an in-process virtual transceiver
///
/// Each connect gets a fresh transceiver on a fresh duplex pipe, the way
/// a power-cycled radio comes back with default state. Scripting handles
/// are kept alive so the radio tasks never see their command channel
/// close.
fn simulated_connector() -> impl LinkConnector {
    let mut radio_controls: Vec<mpsc::Sender<VirtualRadioCommand>> = Vec::new();
    move || {
        let (bridge_side, radio_side) = tokio::io::duplex(1024);
        let (radio_cmd_tx, radio_cmd_rx) = mpsc::channel(8);
        let (state_tx, _state_rx) = broadcast::channel(16);
        radio_controls.push(radio_cmd_tx);
        tokio::spawn(run_virtual_radio_task(
            radio_side,
            VirtualTransceiver::new(),
            radio_cmd_rx,
            state_tx,
        ));
        async move { Ok::<_, LinkError>(bridge_side) }
    }
}

/// Print detected serial ports and exit
fn list_ports() -> anyhow::Result<()> {
    let scanner = PortScanner::new();
    let ports = scanner
        .enumerate_ports()
        .context("could not enumerate serial ports")?;

    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    for port in ports {
        let adapter = port.adapter_name().unwrap_or("unrecognized");
        let product = port.product.as_deref().unwrap_or("-");
        println!("{}  bridge: {}  product: {}", port.port, adapter, product);
    }

    Ok(())
}

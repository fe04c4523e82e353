//! Radio link engine
//!
//! This crate keeps one control client and one QRP transceiver talking
//! across an unreliable serial link. It emulates the radio toward the
//! client, supervises the link toward the hardware, and sequences every
//! keying operation in between.
//!
//! # Architecture
//!
//! Everything runs through a single bridge actor:
//!
//! - The **interpreter** answers emulated CAT verbs from a mirrored
//!   state store and forwards the rest, so control software sees a radio
//!   that is always there
//! - The **keying sequencer** turns key and unkey requests from any
//!   trigger (CAT, VOX, hardware line) into the ordered audio-path and
//!   transmit command sequences the hardware needs
//! - The **supervisor** drives reconnection with backoff, a fast path
//!   for drops mid-transmission, and hardware probing once the retry
//!   budget is spent
//! - The **power monitor** watches forward power during transmit and
//!   recycles the link when the RF path dies quietly
//!
//! Link I/O and client sessions run in their own tasks and talk to the
//! actor over channels; all events emit through a unified [`LinkEvent`]
//! stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use qrp_link::{run_bridge_actor, BridgeConfig, SerialConnector, StateStore};
//! use tokio::sync::mpsc;
//!
//! # async fn start() {
//! let connector = SerialConnector::new(None, 38_400);
//! let store = StateStore::default();
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//!
//! tokio::spawn(run_bridge_actor(
//!     connector,
//!     store.clone(),
//!     BridgeConfig::default(),
//!     cmd_tx.clone(),
//!     cmd_rx,
//!     event_tx,
//! ));
//! # }
//! ```

pub mod actor;
pub mod connection;
pub mod error;
pub mod events;
pub mod interpreter;
pub mod power;
pub mod ptt;
pub mod state;
pub mod supervisor;

// Re-export actor types
pub use actor::{run_bridge_actor, BridgeCommand, BridgeConfig};

// Re-export connection types
pub use connection::{spawn_link_task, LinkConnector, LinkTaskCommand, SerialConnector};

// Re-export event types
pub use events::LinkEvent;

pub use error::LinkError;
pub use interpreter::{ClientAction, HardwareAction};
pub use power::{PowerClass, PowerMonitor, PowerMonitorConfig};
pub use ptt::{PttConfig, PttMachine, PttPhase, TriggerSource};
pub use state::{RadioState, StateStore};
pub use supervisor::{ConnectionState, LinkSupervisor, SupervisorConfig};

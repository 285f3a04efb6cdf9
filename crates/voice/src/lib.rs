//! lanfunk-voice – Relay-Engine des Servers
//!
//! ## Module
//! - [`state`] – Session-Registry mit Control- und Audio-Index
//! - [`router`] – Fan-Out eines Datagramms an alle anderen Sessions
//! - [`udp`] – UDP-Listener und Empfangs-Loop

pub mod router;
pub mod state;
pub mod udp;

pub use router::{fan_out, DatagramSenke, FanOutErgebnis, RelayRouter, RelayStatsSnapshot};
pub use state::{RegistryError, Session, SessionRegistry};
pub use udp::RelayServer;

//! lanfunk-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Server und Client
//! gemeinsam nutzen: den zentralen Fehler-Enum und das kooperative
//! Shutdown-Signal der Client-Loops.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{LanfunkError, Result};
pub use types::ShutdownFlag;

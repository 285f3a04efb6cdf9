//! lanfunk-client – Push-to-Talk Client
//!
//! Bibliotheks-Root fuer die Client-Binary und ihre Tests.

pub mod config;
pub mod control;
pub mod eingabe;
pub mod session;

pub use config::ClientConfig;
pub use control::ControlClient;

//! Fehlertypen fuer lanfunk
//!
//! Zentraler Fehler-Enum fuer den Verbindungsaufbau zum Server
//! (Handshake, Verbindung). Paket-Fehler im laufenden Betrieb werden dagegen
//! lokal geloggt und nie als Fehler weitergereicht.

use std::net::SocketAddr;
use thiserror::Error;

/// Globaler Result-Alias fuer lanfunk
pub type Result<T> = std::result::Result<T, LanfunkError>;

/// Alle Fehler die eine Session oder den Prozess beenden
#[derive(Debug, Error)]
pub enum LanfunkError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung zu {addr} fehlgeschlagen: {grund}")]
    Verbindung { addr: SocketAddr, grund: String },

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    // --- Protokoll ---
    #[error("Handshake fehlgeschlagen: {0}")]
    Handshake(String),
}

impl LanfunkError {
    /// Erstellt einen Handshake-Fehler aus einer beliebigen Nachricht
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler auf die Gegenstelle zurueckgeht
    /// (und nicht auf die lokale Umgebung)
    pub fn ist_gegenstelle(&self) -> bool {
        matches!(
            self,
            Self::Handshake(_) | Self::Getrennt(_) | Self::Zeitlimit(_)
        )
    }
}

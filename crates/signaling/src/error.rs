//! Fehlertypen fuer den Control-Kanal

use lanfunk_protocol::WireError;
use thiserror::Error;

/// Fehlertyp fuer den Control-Kanal
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Zeile konnte nicht gelesen oder geschrieben werden
    #[error("Wire-Fehler: {0}")]
    Wire(#[from] WireError),

    /// Registrierung abgelehnt (fehlerhafte erste Zeile, Adresse belegt)
    #[error("Handshake fehlgeschlagen: {0}")]
    Handshake(String),

    /// Verbindung wurde vor Abschluss getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Keine Registrierung innerhalb des Zeitlimits
    #[error("Timeout")]
    Timeout,
}

impl SignalingError {
    /// Erstellt einen Handshake-Fehler
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }
}

/// Result-Typ fuer den Control-Kanal
pub type SignalingResult<T> = Result<T, SignalingError>;

//! Fehlertypen fuer die Audio-Pipeline
//!
//! Nur Initialisierungsfehler (Geraete, Streams, Codec-Setup) werden als
//! `AudioError` gemeldet. Fehler pro Frame fuehren zu einem verworfenen
//! Frame bzw. einem leeren Fenster, nie zu einem Fehlerwert.

use thiserror::Error;

/// Alle moeglichen Fehler beim Aufbau der Audio-Pipeline
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),
}

pub type AudioResult<T> = Result<T, AudioError>;

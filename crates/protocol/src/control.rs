//! Control-Protokoll (TCP)
//!
//! Zeilenbasiertes Textprotokoll zwischen Client und Server. Jede
//! Nachricht ist genau eine mit `\n` terminierte Zeile.
//!
//! | Richtung        | Zeile               | Bedeutung                          |
//! |-----------------|---------------------|------------------------------------|
//! | Client → Server | `AUDIO_PORT:<port>` | erste Nachricht, meldet UDP-Port   |
//! | Server → Client | `AUDIO_OK`          | Registrierung bestaetigt           |
//! | Client → Server | `QUIT`              | Session geordnet beenden           |
//!
//! Alle anderen Zeilen sind fuer spaetere Erweiterungen reserviert und
//! werden von beiden Seiten ignoriert.

use std::fmt;

/// Standard-Port des Control-Kanals (TCP)
pub const DEFAULT_SERVER_PORT: u16 = 12345;

/// Abstand des UDP-Relay-Ports zum Control-Port
pub const AUDIO_PORT_OFFSET: u16 = 1;

const AUDIO_PORT_PREFIX: &str = "AUDIO_PORT:";
const AUDIO_OK: &str = "AUDIO_OK";
const QUIT: &str = "QUIT";

/// Berechnet den UDP-Relay-Port zu einem Control-Port
///
/// Gibt `None` zurueck wenn der Port ueberlaufen wuerde.
pub fn relay_port(control_port: u16) -> Option<u16> {
    control_port.checked_add(AUDIO_PORT_OFFSET)
}

/// Eine Nachricht auf dem Control-Kanal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Client meldet seinen UDP-Audio-Port (nie 0)
    AudioPort(u16),
    /// Server bestaetigt die Registrierung
    AudioOk,
    /// Client beendet die Session
    Quit,
    /// Jede andere Zeile (auch fehlerhafte `AUDIO_PORT`-Zeilen)
    Unbekannt(String),
}

impl ControlMessage {
    /// Parst eine einzelne Zeile (ohne Zeilenende)
    ///
    /// Fuehrende und folgende Leerzeichen werden ignoriert. Parsen schlaegt
    /// nie fehl: was nicht erkannt wird, landet in `Unbekannt`.
    pub fn parsen(zeile: &str) -> Self {
        let zeile = zeile.trim();

        if let Some(port) = zeile.strip_prefix(AUDIO_PORT_PREFIX) {
            return match port.trim().parse::<u16>() {
                Ok(port) if port != 0 => Self::AudioPort(port),
                _ => Self::Unbekannt(zeile.to_string()),
            };
        }

        match zeile {
            AUDIO_OK => Self::AudioOk,
            QUIT => Self::Quit,
            _ => Self::Unbekannt(zeile.to_string()),
        }
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AudioPort(port) => write!(f, "{AUDIO_PORT_PREFIX}{port}"),
            Self::AudioOk => f.write_str(AUDIO_OK),
            Self::Quit => f.write_str(QUIT),
            Self::Unbekannt(zeile) => f.write_str(zeile),
        }
    }
}

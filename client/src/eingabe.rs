//! PTT-Eingabequelle ueber stdin
//!
//! Platzhalter fuer einen echten Tastatur-Hook. Jede Zeile ist ein Befehl:
//!
//! | Eingabe        | Wirkung                         |
//! |----------------|---------------------------------|
//! | (leer)         | Senden umschalten               |
//! | `d`, `down`    | Taste gedrueckt                 |
//! | `u`, `up`      | Taste losgelassen               |
//! | `q`, `quit`    | Client beenden                  |

use crossbeam_channel::Sender;
use std::io::BufRead;

use lanfunk_audio::PttEreignis;
use lanfunk_core::ShutdownFlag;

/// Ein geparster stdin-Befehl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Befehl {
    Ptt(PttEreignis),
    Beenden,
}

/// Parst eine Eingabezeile, `None` bei unbekannter Eingabe
pub fn befehl_parsen(zeile: &str) -> Option<Befehl> {
    match zeile.trim().to_ascii_lowercase().as_str() {
        "" => Some(Befehl::Ptt(PttEreignis::Umschalten)),
        "d" | "down" => Some(Befehl::Ptt(PttEreignis::Gedrueckt)),
        "u" | "up" => Some(Befehl::Ptt(PttEreignis::Losgelassen)),
        "q" | "quit" => Some(Befehl::Beenden),
        _ => None,
    }
}

/// Liest Befehle bis EOF, `q` oder Shutdown
///
/// Blockiert auf stdin und gehoert daher in einen eigenen Thread.
pub fn eingabe_lesen(eingabe: impl BufRead, tx: Sender<PttEreignis>, shutdown: ShutdownFlag) {
    for zeile in eingabe.lines() {
        if shutdown.ist_ausgeloest() {
            break;
        }
        let Ok(zeile) = zeile else { break };
        match befehl_parsen(&zeile) {
            Some(Befehl::Ptt(ereignis)) => {
                if tx.send(ereignis).is_err() {
                    break;
                }
            }
            Some(Befehl::Beenden) => {
                tracing::info!("Beenden per Eingabe");
                shutdown.ausloesen();
                break;
            }
            None => tracing::warn!(eingabe = %zeile.trim(), "Unbekannte Eingabe (Enter, d, u, q)"),
        }
    }
    tracing::debug!("PTT-Eingabe beendet");
}

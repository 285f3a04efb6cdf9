//! Push-to-Talk Steuerung
//!
//! Die Eingabequelle (Tastatur-Hook, stdin, UI) liefert diskrete
//! [`PttEreignis`]-Werte ueber einen crossbeam-Kanal. Der
//! [`PttController`] wertet sie aus und setzt das [`PttGate`], das der
//! Capture-Callback lock-free liest. Eingabe und Audio-Logik sind damit
//! vollstaendig entkoppelt.

use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use lanfunk_core::ShutdownFlag;

/// Ereignis der PTT-Eingabequelle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttEreignis {
    /// Taste gedrueckt
    Gedrueckt,
    /// Taste losgelassen
    Losgelassen,
    /// Gate unabhaengig vom Modus umschalten
    Umschalten,
}

/// Betriebsmodus fuer Push-to-Talk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PttMode {
    /// Taste halten um zu senden – loslassen stoppt Uebertragung
    #[default]
    Hold,
    /// Einmal druecken zum Aktivieren, nochmals zum Deaktivieren
    Toggle,
}

// ---------------------------------------------------------------------------
// PttGate
// ---------------------------------------------------------------------------

/// Sende-Gate {AUS, AN}, geteilt zwischen Controller und Capture-Callback
#[derive(Debug, Clone, Default)]
pub struct PttGate(Arc<AtomicBool>);

impl PttGate {
    /// Neues Gate im Zustand AUS
    pub fn new() -> Self {
        Self::default()
    }

    /// Gibt zurueck ob aktuell gesendet werden darf
    pub fn ist_offen(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Setzt den Zustand. Gibt true zurueck wenn sich etwas geaendert hat.
    fn setzen(&self, offen: bool) -> bool {
        self.0.swap(offen, Ordering::AcqRel) != offen
    }
}

// ---------------------------------------------------------------------------
// PttController
// ---------------------------------------------------------------------------

/// Push-to-Talk Controller
///
/// Einzige Stelle die das Gate veraendert.
pub struct PttController {
    mode: PttMode,
    gate: PttGate,
    /// Hold-Modus: Taste aktuell gedrueckt?
    key_held: bool,
}

impl PttController {
    pub fn new(mode: PttMode, gate: PttGate) -> Self {
        Self {
            mode,
            gate,
            key_held: false,
        }
    }

    /// Wertet ein Ereignis aus und aktualisiert das Gate
    ///
    /// Wiederholte `Gedrueckt`-Ereignisse bei gehaltener Taste (Auto-Repeat)
    /// haben keine Wirkung, auch nicht im Toggle-Modus.
    pub fn ereignis(&mut self, ereignis: PttEreignis) {
        if ereignis == PttEreignis::Umschalten {
            let neu = !self.gate.ist_offen();
            self.gate.setzen(neu);
            info!(senden = neu, "PTT {}", if neu { "AN" } else { "AUS" });
            return;
        }

        let gedrueckt = ereignis == PttEreignis::Gedrueckt;
        let flanke = gedrueckt != self.key_held;
        self.key_held = gedrueckt;
        if !flanke {
            return;
        }

        let neu = match self.mode {
            PttMode::Hold => gedrueckt,
            PttMode::Toggle if gedrueckt => !self.gate.ist_offen(),
            PttMode::Toggle => return,
        };

        if self.gate.setzen(neu) {
            info!(senden = neu, "PTT {}", if neu { "AN" } else { "AUS" });
        }
    }

    /// Verarbeitet Ereignisse bis der Kanal geschlossen oder der Shutdown
    /// ausgeloest wird. Das Gate wird beim Verlassen geschlossen.
    pub fn laufen(mut self, rx: Receiver<PttEreignis>, shutdown: ShutdownFlag) {
        let intervall = Duration::from_millis(200);
        while !shutdown.ist_ausgeloest() {
            match rx.recv_timeout(intervall) {
                Ok(ereignis) => self.ereignis(ereignis),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    debug!("PTT-Eingabequelle beendet");
                    break;
                }
            }
        }
        self.gate.setzen(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(mode: PttMode) -> (PttController, PttGate) {
        let gate = PttGate::new();
        (PttController::new(mode, gate.clone()), gate)
    }

    #[test]
    fn ptt_hold_sendet_nur_waehrend_taste_gedrueckt() {
        let (mut ptt, gate) = controller(PttMode::Hold);
        assert!(!gate.ist_offen());
        ptt.ereignis(PttEreignis::Gedrueckt);
        assert!(gate.ist_offen());
        ptt.ereignis(PttEreignis::Losgelassen);
        assert!(!gate.ist_offen());
    }

    #[test]
    fn ptt_toggle_wechselt_zustand() {
        let (mut ptt, gate) = controller(PttMode::Toggle);
        ptt.ereignis(PttEreignis::Gedrueckt);
        ptt.ereignis(PttEreignis::Losgelassen);
        assert!(gate.ist_offen(), "Loslassen aendert im Toggle-Modus nichts");
        ptt.ereignis(PttEreignis::Gedrueckt);
        ptt.ereignis(PttEreignis::Losgelassen);
        assert!(!gate.ist_offen());
    }

    #[test]
    fn ptt_auto_repeat_loest_nicht_erneut_aus() {
        let (mut ptt, gate) = controller(PttMode::Toggle);
        ptt.ereignis(PttEreignis::Gedrueckt);
        ptt.ereignis(PttEreignis::Gedrueckt);
        ptt.ereignis(PttEreignis::Gedrueckt);
        assert!(gate.ist_offen(), "Wiederholtes Druecken darf nicht zurueckschalten");
    }

    #[test]
    fn ptt_loslassen_ohne_druecken_ist_wirkungslos() {
        let (mut ptt, gate) = controller(PttMode::Hold);
        ptt.ereignis(PttEreignis::Losgelassen);
        assert!(!gate.ist_offen());
    }

    #[test]
    fn ptt_umschalten_wirkt_auch_im_hold_modus() {
        let (mut ptt, gate) = controller(PttMode::Hold);
        ptt.ereignis(PttEreignis::Umschalten);
        assert!(gate.ist_offen());
        ptt.ereignis(PttEreignis::Umschalten);
        assert!(!gate.ist_offen());
    }

    #[test]
    fn ptt_default_modus_hold() {
        assert_eq!(PttMode::default(), PttMode::Hold);
    }

    #[test]
    fn ptt_laufen_verarbeitet_kanal_und_schliesst_gate() {
        let (ptt, gate) = controller(PttMode::Hold);
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(PttEreignis::Gedrueckt).unwrap();
        drop(tx);

        // Kanal geschlossen -> Loop endet, Gate wird geschlossen
        ptt.laufen(rx, ShutdownFlag::new());
        assert!(!gate.ist_offen());
    }
}

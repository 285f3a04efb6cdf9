//! Gemeinsame Typen fuer lanfunk

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Kooperatives Shutdown-Signal fuer die Client-Loops
///
/// Einmal gesetzt bleibt es gesetzt. Jede Loop prueft das Flag nach
/// jedem Timeout-Intervall und beendet sich dann; laufende Sende- und
/// Empfangsvorgaenge werden nicht abgewartet.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// Erstellt ein neues, nicht gesetztes Flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Setzt das Flag fuer alle Klone
    pub fn ausloesen(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Gibt zurueck ob der Shutdown angefordert wurde
    pub fn ist_ausgeloest(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

//! Session-Registry – In-Memory Zustand aller registrierten Clients
//!
//! Zwei Indizes ueber dieselbe Menge von Sessions:
//! - Control-Adresse (TCP-Peer) -> Session
//! - Audio-Adresse (UDP-Endpunkt) -> Control-Adresse
//!
//! Ein einziger `parking_lot::Mutex` schuetzt beide Indizes. Er wird nur
//! fuer die Dauer eines Einfuegens, Nachschlagens oder Entfernens gehalten,
//! nie ueber I/O hinweg. Eine Session steht damit immer in beiden Indizes
//! oder in keinem.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Eine registrierte Client-Session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Peer-Adresse des Control-Kanals (Identitaet)
    pub control_addr: SocketAddr,
    /// UDP-Endpunkt fuer Audio
    pub audio_addr: SocketAddr,
    /// Zeitpunkt der Registrierung
    pub registriert_seit: Instant,
}

/// Fehler beim Registrieren einer Session
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Audio-Adresse {0} ist bereits registriert")]
    AudioAdresseBelegt(SocketAddr),

    #[error("Control-Adresse {0} ist bereits registriert")]
    ControlAdresseBelegt(SocketAddr),
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RegistryInner {
    nach_control: HashMap<SocketAddr, Session>,
    nach_audio: HashMap<SocketAddr, SocketAddr>,
}

/// Zentrale Registry aller registrierten Sessions
///
/// `Clone`-faehig (innerer Arc), geteilt zwischen Control-Tasks und Relay.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SessionRegistry {
    /// Erstellt eine leere Registry
    pub fn neu() -> Self {
        Self::default()
    }

    /// Traegt eine Session in beide Indizes ein
    ///
    /// Eine bereits vergebene Audio- oder Control-Adresse wird abgelehnt,
    /// die Registry bleibt dann unveraendert.
    pub fn registrieren(
        &self,
        control_addr: SocketAddr,
        audio_addr: SocketAddr,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if inner.nach_audio.contains_key(&audio_addr) {
            return Err(RegistryError::AudioAdresseBelegt(audio_addr));
        }
        if inner.nach_control.contains_key(&control_addr) {
            return Err(RegistryError::ControlAdresseBelegt(control_addr));
        }

        inner.nach_audio.insert(audio_addr, control_addr);
        inner.nach_control.insert(
            control_addr,
            Session {
                control_addr,
                audio_addr,
                registriert_seit: Instant::now(),
            },
        );
        drop(inner);

        tracing::info!(control = %control_addr, audio = %audio_addr, "Session registriert");
        Ok(())
    }

    /// Entfernt eine Session aus beiden Indizes
    pub fn entfernen(&self, control_addr: &SocketAddr) -> Option<Session> {
        let mut inner = self.inner.lock();
        let session = inner.nach_control.remove(control_addr)?;
        inner.nach_audio.remove(&session.audio_addr);
        drop(inner);

        tracing::info!(
            control = %session.control_addr,
            audio = %session.audio_addr,
            "Session entfernt"
        );
        Some(session)
    }

    /// Empfaenger fuer ein Datagramm von `quelle`
    ///
    /// `None` wenn `quelle` keine registrierte Audio-Adresse ist, sonst die
    /// Audio-Adressen aller anderen Sessions (Snapshot).
    pub fn empfaenger_fuer(&self, quelle: &SocketAddr) -> Option<Vec<SocketAddr>> {
        let inner = self.inner.lock();
        if !inner.nach_audio.contains_key(quelle) {
            return None;
        }
        Some(
            inner
                .nach_audio
                .keys()
                .filter(|addr| *addr != quelle)
                .copied()
                .collect(),
        )
    }

    /// Sucht die Session zu einer Control-Adresse
    pub fn session(&self, control_addr: &SocketAddr) -> Option<Session> {
        self.inner.lock().nach_control.get(control_addr).cloned()
    }

    /// Prueft ob eine Audio-Adresse registriert ist
    pub fn ist_audio_registriert(&self, audio_addr: &SocketAddr) -> bool {
        self.inner.lock().nach_audio.contains_key(audio_addr)
    }

    /// Alle registrierten Audio-Adressen
    pub fn audio_adressen(&self) -> Vec<SocketAddr> {
        self.inner.lock().nach_audio.keys().copied().collect()
    }

    /// Anzahl der registrierten Sessions
    pub fn anzahl(&self) -> usize {
        self.inner.lock().nach_control.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.anzahl() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

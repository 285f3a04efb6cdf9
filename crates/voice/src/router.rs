//! Relay-Router – Weiterleitung von Audio-Datagrammen
//!
//! Jedes Datagramm einer registrierten Audio-Adresse geht unveraendert an
//! alle anderen registrierten Adressen. Es gibt keine Sende-Queues: die
//! Empfaengerliste wird unter dem Registry-Lock kopiert, gesendet wird
//! danach direkt auf dem gemeinsamen Socket. Ist der Kernel-Puffer voll,
//! geht genau diese eine Kopie verloren.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;

use crate::state::SessionRegistry;

// ---------------------------------------------------------------------------
// DatagramSenke
// ---------------------------------------------------------------------------

/// Sendet ein einzelnes Datagramm an eine Adresse
#[async_trait]
pub trait DatagramSenke: Send + Sync {
    async fn senden_an(&self, daten: &[u8], ziel: SocketAddr) -> io::Result<usize>;
}

#[async_trait]
impl DatagramSenke for UdpSocket {
    async fn senden_an(&self, daten: &[u8], ziel: SocketAddr) -> io::Result<usize> {
        self.send_to(daten, ziel).await
    }
}

// ---------------------------------------------------------------------------
// Fan-Out
// ---------------------------------------------------------------------------

/// Ergebnis der Weiterleitung eines Datagramms
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOutErgebnis {
    pub gesendet: usize,
    pub fehlgeschlagen: usize,
}

/// Sendet `daten` nacheinander an alle Empfaenger
///
/// Ein Fehler bei einem Empfaenger bricht die Schleife nicht ab.
pub async fn fan_out<S: DatagramSenke + ?Sized>(
    senke: &S,
    daten: &[u8],
    empfaenger: &[SocketAddr],
) -> FanOutErgebnis {
    let mut ergebnis = FanOutErgebnis::default();
    for ziel in empfaenger {
        match senke.senden_an(daten, *ziel).await {
            Ok(_) => ergebnis.gesendet += 1,
            Err(e) => {
                tracing::warn!(fehler = %e, ziel = %ziel, "UDP-Sendefehler beim Weiterleiten");
                ergebnis.fehlgeschlagen += 1;
            }
        }
    }
    ergebnis
}

// ---------------------------------------------------------------------------
// RelayStats
// ---------------------------------------------------------------------------

/// Zaehler des Relays
#[derive(Debug, Default)]
pub struct RelayStats {
    empfangen: AtomicU64,
    weitergeleitet: AtomicU64,
    sende_fehler: AtomicU64,
    unbekannt: AtomicU64,
}

/// Momentaufnahme der [`RelayStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    pub empfangen: u64,
    pub weitergeleitet: u64,
    pub sende_fehler: u64,
    pub unbekannt: u64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            empfangen: self.empfangen.load(Ordering::Relaxed),
            weitergeleitet: self.weitergeleitet.load(Ordering::Relaxed),
            sende_fehler: self.sende_fehler.load(Ordering::Relaxed),
            unbekannt: self.unbekannt.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// RelayRouter
// ---------------------------------------------------------------------------

/// Verbindet Registry-Lookup und Fan-Out
#[derive(Clone)]
pub struct RelayRouter {
    registry: SessionRegistry,
    stats: Arc<RelayStats>,
}

impl RelayRouter {
    pub fn neu(registry: SessionRegistry) -> Self {
        Self {
            registry,
            stats: Arc::new(RelayStats::default()),
        }
    }

    /// Verarbeitet ein eingehendes Datagramm
    ///
    /// Gibt `None` zurueck wenn die Quelle nicht registriert ist.
    pub async fn datagramm_weiterleiten<S: DatagramSenke + ?Sized>(
        &self,
        senke: &S,
        daten: &[u8],
        quelle: SocketAddr,
    ) -> Option<FanOutErgebnis> {
        self.stats.empfangen.fetch_add(1, Ordering::Relaxed);

        // Lock nur fuer den Snapshot, nicht waehrend des Sendens
        let Some(empfaenger) = self.registry.empfaenger_fuer(&quelle) else {
            tracing::debug!(quelle = %quelle, bytes = daten.len(), "Datagramm von unbekannter Quelle verworfen");
            self.stats.unbekannt.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let ergebnis = fan_out(senke, daten, &empfaenger).await;
        self.stats
            .weitergeleitet
            .fetch_add(ergebnis.gesendet as u64, Ordering::Relaxed);
        self.stats
            .sende_fehler
            .fetch_add(ergebnis.fehlgeschlagen as u64, Ordering::Relaxed);

        tracing::trace!(
            quelle = %quelle,
            bytes = daten.len(),
            empfaenger = ergebnis.gesendet,
            "Datagramm weitergeleitet"
        );
        Some(ergebnis)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

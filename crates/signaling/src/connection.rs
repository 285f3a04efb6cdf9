//! Client-Session – Verwaltet eine einzelne Control-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientSession` in einem eigenen
//! tokio-Task.
//!
//! ## State Machine
//! ```text
//! Ausstehend --AUDIO_PORT:<port>--> Registriert --QUIT/EOF/Fehler--> (entfernt)
//!     |
//!     +-- fehlerhafte Zeile / Timeout / EOF --> (geschlossen, nichts bleibt)
//! ```
//!
//! Eine ausstehende Session ist fuer die Registry unsichtbar. Nach der
//! Registrierung werden alle weiteren Zeilen ausser `QUIT` ignoriert.
//! Jeder Ausgang aus `verarbeiten` entfernt die Session, auch wenn der
//! Shutdown mitten im Handshake eintrifft.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_util::codec::Framed;

use lanfunk_protocol::{ControlCodec, ControlMessage};
use lanfunk_voice::SessionRegistry;

use crate::error::{SignalingError, SignalingResult};

/// Standard-Zeitlimit fuer die erste Zeile
pub const DEFAULT_REGISTRIERUNGS_TIMEOUT: Duration = Duration::from_secs(5);

/// Wartet bis der Shutdown signalisiert oder der Sender verworfen wurde
async fn shutdown_abwarten(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// ClientSession
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne Control-Verbindung
pub struct ClientSession {
    peer_addr: SocketAddr,
    registry: SessionRegistry,
    registrierungs_timeout: Duration,
}

impl ClientSession {
    /// Erstellt eine neue, ausstehende Session
    pub fn neu(
        peer_addr: SocketAddr,
        registry: SessionRegistry,
        registrierungs_timeout: Duration,
    ) -> Self {
        Self {
            peer_addr,
            registry,
            registrierungs_timeout,
        }
    }

    /// Startet die Verarbeitung
    ///
    /// Laeuft bis die Verbindung endet oder der Shutdown signalisiert wird.
    /// Beim Verlassen ist die Session in keinem Index mehr eingetragen.
    pub async fn verarbeiten<T>(self, stream: T, mut shutdown_rx: watch::Receiver<bool>)
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let peer_addr = self.peer_addr;
        tracing::debug!(peer = %peer_addr, "Neue Control-Verbindung");

        let mut framed = Framed::new(stream, ControlCodec::new());

        // Der Handshake kann nach `registrieren` abgebrochen werden (z.B. beim
        // Senden von AUDIO_OK), daher wird danach immer aufgeraeumt
        let registrierung = tokio::select! {
            r = self.handshake(&mut framed) => Some(r),
            _ = shutdown_abwarten(&mut shutdown_rx) => None,
        };

        let Some(registrierung) = registrierung else {
            tracing::debug!(peer = %peer_addr, "Shutdown waehrend Handshake");
            self.registry.entfernen(&peer_addr);
            return;
        };

        if let Err(e) = registrierung {
            self.registry.entfernen(&peer_addr);
            match e {
                SignalingError::Timeout | SignalingError::VerbindungGetrennt => {
                    tracing::info!(peer = %peer_addr, grund = %e, "Keine Registrierung, Verbindung geschlossen")
                }
                _ => tracing::warn!(peer = %peer_addr, fehler = %e, "Handshake abgelehnt"),
            }
            return;
        }

        loop {
            tokio::select! {
                zeile = framed.next() => {
                    match zeile {
                        Some(Ok(ControlMessage::Quit)) => {
                            tracing::info!(peer = %peer_addr, "QUIT empfangen");
                            break;
                        }
                        Some(Ok(nachricht)) => {
                            tracing::trace!(peer = %peer_addr, zeile = %nachricht, "Zeile ignoriert");
                        }
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Lesefehler auf Control-Kanal");
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                _ = shutdown_abwarten(&mut shutdown_rx) => {
                    tracing::info!(peer = %peer_addr, "Shutdown-Signal, Verbindung wird getrennt");
                    break;
                }
            }
        }

        self.registry.entfernen(&peer_addr);
        tracing::debug!(peer = %peer_addr, "Verbindungs-Task beendet");
    }

    /// Erwartet `AUDIO_PORT:<port>` als erste Zeile und registriert
    ///
    /// Bei jedem Fehler wird nichts geantwortet und nichts bleibt in der
    /// Registry.
    async fn handshake<T>(
        &self,
        framed: &mut Framed<T, ControlCodec>,
    ) -> SignalingResult<SocketAddr>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let erste_zeile = tokio::time::timeout(self.registrierungs_timeout, framed.next())
            .await
            .map_err(|_| SignalingError::Timeout)?;

        let port = match erste_zeile {
            Some(Ok(ControlMessage::AudioPort(port))) => port,
            Some(Ok(andere)) => {
                return Err(SignalingError::handshake(format!(
                    "unerwartete erste Zeile '{andere}'"
                )))
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(SignalingError::VerbindungGetrennt),
        };

        let audio_addr = SocketAddr::new(self.peer_addr.ip(), port);
        self.registry
            .registrieren(self.peer_addr, audio_addr)
            .map_err(|e| SignalingError::handshake(e.to_string()))?;

        if let Err(e) = framed.send(ControlMessage::AudioOk).await {
            self.registry.entfernen(&self.peer_addr);
            return Err(e.into());
        }

        Ok(audio_addr)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

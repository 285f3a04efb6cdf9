//! Control-Verbindung des Clients
//!
//! Registriert den lokalen Audio-Port beim Server und haelt danach die
//! TCP-Verbindung offen. Schliesst der Server die Verbindung, wird der
//! Shutdown ausgeloest; beim eigenen Shutdown wird `QUIT` gesendet.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use lanfunk_core::{LanfunkError, Result, ShutdownFlag};
use lanfunk_protocol::{ControlCodec, ControlMessage};

/// Wartezeit pro Leseversuch, danach wird der Shutdown geprueft
pub const LESE_INTERVALL: Duration = Duration::from_millis(200);

/// Registrierte Control-Verbindung
pub struct ControlClient {
    framed: Framed<TcpStream, ControlCodec>,
    server_addr: SocketAddr,
}

impl ControlClient {
    /// Verbindet und fuehrt den Handshake durch
    ///
    /// `timeout` gilt fuer den Verbindungsaufbau und separat fuer das
    /// Warten auf `AUDIO_OK`.
    pub async fn verbinden(
        server_addr: SocketAddr,
        audio_port: u16,
        timeout: Duration,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(server_addr))
            .await
            .map_err(|_| LanfunkError::Zeitlimit(format!("Verbindung zu {server_addr}")))?
            .map_err(|e| LanfunkError::Verbindung {
                addr: server_addr,
                grund: e.to_string(),
            })?;
        let _ = stream.set_nodelay(true);

        let mut framed = Framed::new(stream, ControlCodec::new());
        framed
            .send(ControlMessage::AudioPort(audio_port))
            .await
            .map_err(|e| LanfunkError::Getrennt(e.to_string()))?;

        let antwort = tokio::time::timeout(timeout, framed.next())
            .await
            .map_err(|_| LanfunkError::Zeitlimit("keine Antwort auf AUDIO_PORT".into()))?;

        match antwort {
            Some(Ok(ControlMessage::AudioOk)) => {
                tracing::info!(server = %server_addr, audio_port, "Beim Server registriert");
                Ok(Self {
                    framed,
                    server_addr,
                })
            }
            Some(Ok(andere)) => Err(LanfunkError::handshake(format!(
                "unerwartete Antwort '{andere}'"
            ))),
            Some(Err(e)) => Err(LanfunkError::handshake(e.to_string())),
            None => Err(LanfunkError::Getrennt(
                "Server hat die Registrierung nicht bestaetigt".into(),
            )),
        }
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Haelt die Verbindung bis zum Shutdown
    ///
    /// Unbekannte Zeilen vom Server werden geloggt und ignoriert. Endet die
    /// Verbindung serverseitig, wird `shutdown` ausgeloest.
    pub async fn laufen(mut self, shutdown: ShutdownFlag) {
        while !shutdown.ist_ausgeloest() {
            match tokio::time::timeout(LESE_INTERVALL, self.framed.next()).await {
                Ok(Some(Ok(nachricht))) => {
                    tracing::debug!(zeile = %nachricht, "Zeile vom Server ignoriert");
                }
                Ok(Some(Err(e))) => {
                    tracing::warn!(fehler = %e, "Lesefehler auf Control-Verbindung");
                    shutdown.ausloesen();
                }
                Ok(None) => {
                    tracing::info!(server = %self.server_addr, "Server hat die Verbindung geschlossen");
                    shutdown.ausloesen();
                }
                Err(_) => continue,
            }
        }

        // Best effort, Fehler sind hier bedeutungslos
        let quit =
            tokio::time::timeout(LESE_INTERVALL, self.framed.send(ControlMessage::Quit)).await;
        tracing::debug!(gesendet = matches!(quit, Ok(Ok(()))), "QUIT");
    }
}

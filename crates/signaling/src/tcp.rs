//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `ControlServer` akzeptiert Verbindungen in einer Loop und startet
//! fuer jede einen eigenen tokio-Task mit einer `ClientSession`. Beim
//! Shutdown wartet er, bis alle Verbindungs-Tasks ihre Session entfernt
//! haben.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use lanfunk_voice::SessionRegistry;

use crate::connection::ClientSession;

/// TCP Control-Server
pub struct ControlServer {
    listener: TcpListener,
    registry: SessionRegistry,
    registrierungs_timeout: Duration,
}

impl ControlServer {
    /// Bindet den TCP-Socket
    pub async fn binden(
        addr: SocketAddr,
        registry: SessionRegistry,
        registrierungs_timeout: Duration,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::mit_listener(listener, registry, registrierungs_timeout))
    }

    /// Verwendet einen bereits gebundenen Listener
    pub fn mit_listener(
        listener: TcpListener,
        registry: SessionRegistry,
        registrierungs_timeout: Duration,
    ) -> Self {
        Self {
            listener,
            registry,
            registrierungs_timeout,
        }
    }

    /// Gibt die lokale Bind-Adresse zurueck
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` true meldet
    pub async fn accept_loop(self, mut shutdown_rx: watch::Receiver<bool>) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(adresse = %addr, "TCP Control-Server gestartet");
        }

        let mut verbindungen = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                            }
                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");

                            let session = ClientSession::neu(
                                peer_addr,
                                self.registry.clone(),
                                self.registrierungs_timeout,
                            );
                            verbindungen.spawn(session.verarbeiten(stream, shutdown_rx.clone()));
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                // Beendete Verbindungs-Tasks einsammeln
                Some(ergebnis) = verbindungen.join_next(), if !verbindungen.is_empty() => {
                    if let Err(e) = ergebnis {
                        tracing::error!(fehler = %e, "Verbindungs-Task abgebrochen");
                    }
                }

                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Control-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        // Verbindungs-Tasks sehen dasselbe Signal und entfernen ihre Sessions
        while verbindungen.join_next().await.is_some() {}

        tracing::info!(
            verbleibend = self.registry.anzahl(),
            "TCP Control-Server gestoppt"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    async fn server_starten(
        registry: SessionRegistry,
    ) -> (SocketAddr, watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let server = ControlServer::binden(
            "127.0.0.1:0".parse().unwrap(),
            registry,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let addr = server.lokale_adresse().unwrap();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(server.accept_loop(rx));
        (addr, tx, task)
    }

    #[tokio::test]
    async fn handshake_ueber_tcp() {
        let registry = SessionRegistry::neu();
        let (addr, shutdown_tx, task) = server_starten(registry.clone()).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let lokal = stream.local_addr().unwrap();
        let mut stream = BufReader::new(stream);
        stream.write_all(b"AUDIO_PORT:45678\n").await.unwrap();

        let mut antwort = String::new();
        stream.read_line(&mut antwort).await.unwrap();
        assert_eq!(antwort, "AUDIO_OK\n");

        let session = registry.session(&lokal).unwrap();
        assert_eq!(session.audio_addr, SocketAddr::new(lokal.ip(), 45678));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("Server muss nach Shutdown enden")
            .unwrap();
        assert!(registry.ist_leer(), "Shutdown muss alle Sessions entfernen");
    }

    #[tokio::test]
    async fn shutdown_ohne_verbindungen() {
        let (_, shutdown_tx, task) = server_starten(SessionRegistry::neu()).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("Server muss nach Shutdown enden")
            .unwrap();
    }
}

//! UDP Relay-Server – Empfangs-Loop
//!
//! ```text
//! UDP Socket (recv_from)
//!     |
//!     v
//! SessionRegistry::empfaenger_fuer()  <- Quelle identifizieren, Snapshot
//!     |
//!     v
//! fan_out()                           <- send_to an jeden Empfaenger
//! ```
//!
//! Das Fan-Out eines Datagramms ist abgeschlossen bevor das naechste gelesen
//! wird. Die Reihenfolge pro Absender bleibt damit erhalten.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;

use lanfunk_protocol::MAX_DATAGRAM_SIZE;

use crate::router::{RelayRouter, RelayStatsSnapshot};
use crate::state::SessionRegistry;

/// UDP Relay-Server
pub struct RelayServer {
    socket: Arc<UdpSocket>,
    router: RelayRouter,
}

impl RelayServer {
    /// Bindet den UDP-Socket und erstellt einen neuen RelayServer
    pub async fn binden(addr: SocketAddr, registry: SessionRegistry) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::mit_socket(socket, registry))
    }

    /// Verwendet einen bereits gebundenen Socket
    pub fn mit_socket(socket: UdpSocket, registry: SessionRegistry) -> Self {
        if let Ok(addr) = socket.local_addr() {
            tracing::info!(addr = %addr, "UDP Relay gebunden");
        }
        Self {
            socket: Arc::new(socket),
            router: RelayRouter::neu(registry),
        }
    }

    /// Gibt die lokale Bind-Adresse zurueck
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn router(&self) -> &RelayRouter {
        &self.router
    }

    /// Startet die Empfangs-Loop (laeuft bis `shutdown_rx` true meldet)
    pub async fn empfangs_loop(
        &self,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> RelayStatsSnapshot {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        tracing::info!("Relay-Empfangs-Loop gestartet");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, quelle)) => {
                            self.router
                                .datagramm_weiterleiten(self.socket.as_ref(), &buf[..len], quelle)
                                .await;
                        }
                        Err(e) => {
                            tracing::warn!(fehler = %e, "UDP-Empfangsfehler");
                            // Kurze Pause gegen Busy-Loop bei persistentem Fehler
                            tokio::time::sleep(Duration::from_millis(1)).await;
                        }
                    }
                }

                result = shutdown_rx.changed() => {
                    if result.is_err() {
                        break;
                    }
                }
            }
        }

        let stats = self.router.stats();
        tracing::info!(
            empfangen = stats.empfangen,
            weitergeleitet = stats.weitergeleitet,
            sende_fehler = stats.sende_fehler,
            unbekannt = stats.unbekannt,
            "Relay-Empfangs-Loop beendet"
        );
        stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn localhost(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    async fn server_starten(
        registry: SessionRegistry,
    ) -> (
        SocketAddr,
        watch::Sender<bool>,
        tokio::task::JoinHandle<RelayStatsSnapshot>,
    ) {
        let server = RelayServer::binden(localhost(0), registry).await.unwrap();
        let addr = server.lokale_adresse().unwrap();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(async move { server.empfangs_loop(rx).await });
        (addr, tx, task)
    }

    #[tokio::test]
    async fn relay_binden() {
        let server = RelayServer::binden(localhost(0), SessionRegistry::neu())
            .await
            .expect("Server muss binden koennen");
        let addr = server.lokale_adresse().unwrap();
        assert_ne!(addr.port(), 0, "OS muss einen Port zuweisen");
    }

    #[tokio::test]
    async fn relay_leitet_an_andere_clients_weiter() {
        let registry = SessionRegistry::neu();
        let a = UdpSocket::bind(localhost(0)).await.unwrap();
        let b = UdpSocket::bind(localhost(0)).await.unwrap();
        let c = UdpSocket::bind(localhost(0)).await.unwrap();
        registry.registrieren(localhost(1), a.local_addr().unwrap()).unwrap();
        registry.registrieren(localhost(2), b.local_addr().unwrap()).unwrap();
        registry.registrieren(localhost(3), c.local_addr().unwrap()).unwrap();

        let (server_addr, shutdown_tx, task) = server_starten(registry).await;

        a.send_to(b"frame-1", server_addr).await.unwrap();

        let mut buf = [0u8; 64];
        for empfaenger in [&b, &c] {
            let (n, von) =
                tokio::time::timeout(Duration::from_secs(1), empfaenger.recv_from(&mut buf))
                    .await
                .expect("Datagramm muss ankommen")
                .unwrap();
            assert_eq!(&buf[..n], b"frame-1");
            assert_eq!(von, server_addr);
        }

        // Absender bekommt nichts zurueck
        let echo = tokio::time::timeout(Duration::from_millis(100), a.recv_from(&mut buf)).await;
        assert!(echo.is_err(), "Absender darf sein eigenes Datagramm nicht erhalten");

        shutdown_tx.send(true).unwrap();
        let stats = task.await.unwrap();
        assert_eq!(stats.empfangen, 1);
        assert_eq!(stats.weitergeleitet, 2);
    }

    #[tokio::test]
    async fn relay_ignoriert_unbekannte_quelle() {
        let registry = SessionRegistry::neu();
        let a = UdpSocket::bind(localhost(0)).await.unwrap();
        registry.registrieren(localhost(1), a.local_addr().unwrap()).unwrap();
        let fremd = UdpSocket::bind(localhost(0)).await.unwrap();

        let (server_addr, shutdown_tx, task) = server_starten(registry).await;
        fremd.send_to(b"stoerung", server_addr).await.unwrap();

        let mut buf = [0u8; 64];
        let empfangen =
            tokio::time::timeout(Duration::from_millis(200), a.recv_from(&mut buf)).await;
        assert!(empfangen.is_err(), "Unbekannte Quelle darf nichts ausloesen");

        shutdown_tx.send(true).unwrap();
        let stats = task.await.unwrap();
        assert_eq!(stats.unbekannt, 1);
        assert_eq!(stats.weitergeleitet, 0);
    }

    #[tokio::test]
    async fn relay_reihenfolge_pro_absender() {
        let registry = SessionRegistry::neu();
        let a = UdpSocket::bind(localhost(0)).await.unwrap();
        let b = UdpSocket::bind(localhost(0)).await.unwrap();
        registry.registrieren(localhost(1), a.local_addr().unwrap()).unwrap();
        registry.registrieren(localhost(2), b.local_addr().unwrap()).unwrap();

        let (server_addr, shutdown_tx, task) = server_starten(registry).await;
        for i in 0u8..10 {
            a.send_to(&[i], server_addr).await.unwrap();
        }

        let mut buf = [0u8; 8];
        for i in 0u8..10 {
            let (n, _) = tokio::time::timeout(Duration::from_secs(1), b.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&buf[..n], &[i]);
        }

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn relay_endet_bei_shutdown() {
        let (_, shutdown_tx, task) = server_starten(SessionRegistry::neu()).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("Loop muss nach Shutdown enden")
            .unwrap();
    }
}

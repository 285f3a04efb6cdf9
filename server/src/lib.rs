//! lanfunk-server – Bibliotheks-Root
//!
//! Bindet Control-Port P (TCP) und Relay-Port P+1 (UDP) und verbindet
//! beide ueber eine gemeinsame Session-Registry. Oeffentlich fuer
//! Integrationstests.

pub mod config;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::watch;

use config::ServerConfig;
use lanfunk_protocol::relay_port;
use lanfunk_signaling::ControlServer;
use lanfunk_voice::{RelayServer, SessionRegistry};

/// Versuche ein freies Portpaar zu finden, wenn Port 0 konfiguriert ist
const PORTPAAR_VERSUCHE: usize = 16;

/// Tatsaechlich gebundene Adressen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GebundeneAdressen {
    pub control: SocketAddr,
    pub relay: SocketAddr,
}

/// Haelt den gebundenen Server-Zustand zusammen
pub struct Server {
    config: ServerConfig,
    registry: SessionRegistry,
    control: ControlServer,
    relay: RelayServer,
}

impl Server {
    /// Bindet TCP-Port P und UDP-Port P+1
    pub async fn binden(config: ServerConfig) -> Result<Self> {
        config.pruefen()?;
        let ip = config.bind_ip()?;

        let (listener, socket) = if config.netzwerk.tcp_port == 0 {
            portpaar_suchen(ip).await?
        } else {
            let tcp_addr = SocketAddr::new(ip, config.netzwerk.tcp_port);
            let listener = TcpListener::bind(tcp_addr)
                .await
                .with_context(|| format!("TCP-Port {tcp_addr} nicht bindbar"))?;
            let udp_port =
                relay_port(tcp_addr.port()).context("Relay-Port ausserhalb des Bereichs")?;
            let udp_addr = SocketAddr::new(ip, udp_port);
            let socket = UdpSocket::bind(udp_addr)
                .await
                .with_context(|| format!("UDP-Port {udp_addr} nicht bindbar"))?;
            (listener, socket)
        };

        let registry = SessionRegistry::neu();
        let control = ControlServer::mit_listener(
            listener,
            registry.clone(),
            config.registrierungs_timeout(),
        );
        let relay = RelayServer::mit_socket(socket, registry.clone());

        Ok(Self {
            config,
            registry,
            control,
            relay,
        })
    }

    /// Gibt die gebundenen Adressen zurueck
    pub fn adressen(&self) -> Result<GebundeneAdressen> {
        Ok(GebundeneAdressen {
            control: self.control.lokale_adresse()?,
            relay: self.relay.lokale_adresse()?,
        })
    }

    /// Geteilte Registry (fuer Tests und Diagnose)
    pub fn registry(&self) -> SessionRegistry {
        self.registry.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Laeuft bis `shutdown_rx` true meldet
    ///
    /// Kehrt erst zurueck, wenn alle Verbindungen geschlossen und alle
    /// Sessions entfernt sind.
    pub async fn laufen(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let adressen = self.adressen()?;
        tracing::info!(
            control = %adressen.control,
            relay = %adressen.relay,
            "Server laeuft"
        );

        let relay = self.relay;
        let relay_rx = shutdown_rx.clone();
        let relay_task = tokio::spawn(async move { relay.empfangs_loop(relay_rx).await });

        self.control.accept_loop(shutdown_rx).await;
        relay_task.await.context("Relay-Task abgebrochen")?;

        tracing::info!("Server beendet");
        Ok(())
    }

    /// Startet den Server und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server_task = tokio::spawn(self.laufen(shutdown_rx));

        tracing::info!("Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        let _ = shutdown_tx.send(true);
        server_task.await.context("Server-Task abgebrochen")?
    }
}

/// Sucht ein Portpaar (P, P+1) bei dem beide Ports frei sind
async fn portpaar_suchen(ip: std::net::IpAddr) -> Result<(TcpListener, UdpSocket)> {
    for versuch in 1..=PORTPAAR_VERSUCHE {
        let listener = TcpListener::bind(SocketAddr::new(ip, 0)).await?;
        let Some(udp_port) = relay_port(listener.local_addr()?.port()) else {
            continue;
        };
        match UdpSocket::bind(SocketAddr::new(ip, udp_port)).await {
            Ok(socket) => return Ok((listener, socket)),
            Err(e) => {
                tracing::debug!(versuch, udp_port, fehler = %e, "Relay-Port belegt, neuer Versuch");
            }
        }
    }
    anyhow::bail!("Kein freies Portpaar nach {PORTPAAR_VERSUCHE} Versuchen")
}

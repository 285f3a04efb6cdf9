//! Client-Konfiguration
//!
//! TOML-Datei (`LANFUNK_CLIENT_CONFIG`, Standard `client.toml`) mit
//! Standardwerten fuer jedes Feld. Die Serveradresse kann per
//! `LANFUNK_SERVER` ueberschrieben werden (`host` oder `host:port`).

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use lanfunk_audio::PttMode;
use lanfunk_observability::LoggingConfig;
use lanfunk_protocol::DEFAULT_SERVER_PORT;

pub const ENV_SERVER: &str = "LANFUNK_SERVER";

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerVerbindung,
    pub audio: AudioEinstellungen,
    pub logging: LoggingConfig,
}

/// Ziel und Zeitlimits der Control-Verbindung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerVerbindung {
    pub adresse: String,
    pub port: u16,
    /// Zeitlimit fuer Verbindungsaufbau und `AUDIO_OK`
    pub handshake_timeout_ms: u64,
}

impl Default for ServerVerbindung {
    fn default() -> Self {
        Self {
            adresse: "127.0.0.1".into(),
            port: DEFAULT_SERVER_PORT,
            handshake_timeout_ms: 5000,
        }
    }
}

/// PTT-Modus wie in der Konfigurationsdatei geschrieben
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PttModus {
    #[default]
    Hold,
    Toggle,
}

impl From<PttModus> for PttMode {
    fn from(modus: PttModus) -> Self {
        match modus {
            PttModus::Hold => PttMode::Hold,
            PttModus::Toggle => PttMode::Toggle,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    /// Opus bevorzugen; ohne Opus wird Raw-PCM gesendet
    pub kompression: bool,
    pub ptt_modus: PttModus,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            kompression: true,
            ptt_modus: PttModus::Hold,
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration, fehlende Datei ergibt Standardwerte
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Loest die Serveradresse auf, `LANFUNK_SERVER` hat Vorrang
    pub fn server_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server_addr_mit(std::env::var(ENV_SERVER).ok())
    }

    pub fn server_addr_mit(&self, ueberschreibung: Option<String>) -> anyhow::Result<SocketAddr> {
        let (host, port) = match ueberschreibung.filter(|s| !s.trim().is_empty()) {
            Some(ziel) => host_und_port(ziel.trim(), self.server.port)?,
            None => (self.server.adresse.clone(), self.server.port),
        };

        (host.as_str(), port)
            .to_socket_addrs()
            .with_context(|| format!("Serveradresse '{host}' nicht aufloesbar"))?
            .next()
            .with_context(|| format!("Keine Adresse fuer '{host}'"))
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.server.handshake_timeout_ms)
    }
}

/// Zerlegt `host` oder `host:port`; IPv6 nur in Klammern mit Port
fn host_und_port(ziel: &str, standard_port: u16) -> anyhow::Result<(String, u16)> {
    if let Ok(addr) = ziel.parse::<SocketAddr>() {
        return Ok((addr.ip().to_string(), addr.port()));
    }
    match ziel.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            let port = port
                .parse()
                .with_context(|| format!("Ungueltiger Port in '{ziel}'"))?;
            Ok((host.to_string(), port))
        }
        _ => Ok((ziel.to_string(), standard_port)),
    }
}

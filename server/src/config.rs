//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use lanfunk_observability::LoggingConfig;
use lanfunk_protocol::{relay_port, DEFAULT_SERVER_PORT};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Control-Kanal
    pub signaling: SignalingEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingConfig,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer TCP und UDP
    pub bind_adresse: String,
    /// Port des Control-Kanals. Der Relay lauscht auf `tcp_port + 1`.
    /// 0 = vom Betriebssystem gewaehlt.
    pub tcp_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: DEFAULT_SERVER_PORT,
        }
    }
}

/// Einstellungen des Control-Kanals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    /// Zeit bis zur ersten Zeile `AUDIO_PORT:<port>` in Millisekunden
    pub registrierungs_timeout_ms: u64,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        Self {
            registrierungs_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    ///
    /// Fehlt die Datei, werden Standardwerte verwendet.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.pruefen()?;
                Ok(config)
            }
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

    /// Prueft Werte, die toml allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        self.bind_ip()?;
        if self.netzwerk.tcp_port != 0 && relay_port(self.netzwerk.tcp_port).is_none() {
            anyhow::bail!(
                "tcp_port {} laesst keinen Platz fuer den Relay-Port",
                self.netzwerk.tcp_port
            );
        }
        if self.signaling.registrierungs_timeout_ms == 0 {
            anyhow::bail!("registrierungs_timeout_ms muss groesser 0 sein");
        }
        Ok(())
    }

    /// Bind-Adresse als IP
    pub fn bind_ip(&self) -> anyhow::Result<IpAddr> {
        self.netzwerk
            .bind_adresse
            .parse()
            .with_context(|| format!("Ungueltige bind_adresse '{}'", self.netzwerk.bind_adresse))
    }

    pub fn registrierungs_timeout(&self) -> Duration {
        Duration::from_millis(self.signaling.registrierungs_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanfunk_observability::LogFormat;

    #[test]
    fn standardwerte() {
        let config = ServerConfig::default();
        assert_eq!(config.netzwerk.tcp_port, 12345);
        assert_eq!(config.registrierungs_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.bind_ip().unwrap(),
            "0.0.0.0".parse::<IpAddr>().unwrap()
        );
        assert!(config.pruefen().is_ok());
    }

    #[test]
    fn teilweise_konfiguration_aus_toml() {
        let config: ServerConfig = toml::from_str(
            r#"
            [netzwerk]
            tcp_port = 20000

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.netzwerk.tcp_port, 20000);
        assert_eq!(config.netzwerk.bind_adresse, "0.0.0.0");
        assert_eq!(config.signaling.registrierungs_timeout_ms, 5000);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn ungueltige_werte_werden_abgelehnt() {
        let mut config = ServerConfig::default();
        config.netzwerk.tcp_port = u16::MAX;
        assert!(config.pruefen().is_err());

        let mut config = ServerConfig::default();
        config.netzwerk.bind_adresse = "kein-host".into();
        assert!(config.pruefen().is_err());

        let mut config = ServerConfig::default();
        config.signaling.registrierungs_timeout_ms = 0;
        assert!(config.pruefen().is_err());
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let config = ServerConfig::laden("/nicht/vorhanden/server.toml").unwrap();
        assert_eq!(config.netzwerk.tcp_port, DEFAULT_SERVER_PORT);
    }
}

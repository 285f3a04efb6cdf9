//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per `[logging]`-Abschnitt der Konfigurationsdatei und
//! per Umgebungsvariable (hat Vorrang):
//! - `LANFUNK_LOG_LEVEL`: EnvFilter-Direktive, z.B. `debug` oder
//!   `info,lanfunk_voice=trace`. Standard: info
//! - `LANFUNK_LOG_FORMAT`: `text` oder `json`. Standard: text

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "LANFUNK_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LANFUNK_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            andere => Err(format!("unbekanntes Log-Format '{andere}'")),
        }
    }
}

/// `[logging]`-Abschnitt der Konfiguration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Wendet Umgebungs-Overrides an. Ungueltige Formate werden ignoriert.
    pub fn mit_overrides(mut self, level: Option<String>, format: Option<String>) -> Self {
        if let Some(level) = level.filter(|l| !l.trim().is_empty()) {
            self.level = level;
        }
        if let Some(format) = format.and_then(|f| f.parse().ok()) {
            self.format = format;
        }
        self
    }

    /// Liest `LANFUNK_LOG_LEVEL` und `LANFUNK_LOG_FORMAT`
    pub fn mit_env_overrides(self) -> Self {
        self.mit_overrides(
            std::env::var(ENV_LOG_LEVEL).ok(),
            std::env::var(ENV_LOG_FORMAT).ok(),
        )
    }
}

/// Initialisiert das Logging-System.
///
/// Eine ungueltige Level-Direktive faellt auf `info` zurueck. Schlaegt fehl,
/// wenn bereits ein globaler Subscriber gesetzt ist.
pub fn logging_initialisieren(config: &LoggingConfig) -> anyhow::Result<()> {
    let config = config.clone().mit_env_overrides();
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Logging konnte nicht initialisiert werden: {e}"))
}

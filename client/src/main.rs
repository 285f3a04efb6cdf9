//! lanfunk Client – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging, startet die
//! stdin-PTT-Quelle und fuehrt die Session bis Ctrl-C, `q` oder
//! Verbindungsende aus.

use anyhow::Result;
use lanfunk_client::{config::ClientConfig, eingabe, session};
use lanfunk_core::ShutdownFlag;
use lanfunk_observability::logging_initialisieren;

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad =
        std::env::var("LANFUNK_CLIENT_CONFIG").unwrap_or_else(|_| "client.toml".into());
    let config = ClientConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "lanfunk Client wird initialisiert"
    );

    let shutdown = ShutdownFlag::new();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C empfangen, Client wird beendet");
            }
            shutdown.ausloesen();
        }
    });

    // stdin blockiert; der Thread wird beim Prozessende verworfen
    let (ptt_tx, ptt_rx) = crossbeam_channel::unbounded();
    std::thread::Builder::new()
        .name("lanfunk-eingabe".into())
        .spawn({
            let shutdown = shutdown.clone();
            move || eingabe::eingabe_lesen(std::io::stdin().lock(), ptt_tx, shutdown)
        })?;

    session::ausfuehren(&config, ptt_rx, shutdown).await
}

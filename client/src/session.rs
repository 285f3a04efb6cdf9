//! Voice-Session: verbindet Control-Kanal, Audio-Thread und Playback
//!
//! 1. UDP-Socket binden (OS waehlt Port), nicht-blockierend
//! 2. Audio-Thread starten (haelt die cpal-Streams, `Stream` ist !Send)
//! 3. Handshake mit dem Server
//! 4. Playback-Task und Control-Task bis zum Shutdown
//!
//! Capture (Klon des Sockets im cpal-Callback) und Playback (tokio-Socket
//! aus einem weiteren Klon) teilen sich denselben lokalen Port, damit die
//! Absenderadresse dem registrierten Audio-Endpunkt entspricht.

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait};
use crossbeam_channel::Receiver;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

use lanfunk_audio::{
    open_capture_stream, open_playback_stream, playback_loop, AudioError, AudioResult,
    CapturePipeline, CaptureStream, CodecArt, PaketSenke, PlaybackConfig, PlaybackProducer,
    PlaybackStream, PttController, PttEreignis, PttGate, UdpPaketSenke,
};
use lanfunk_core::{LanfunkError, ShutdownFlag};
use lanfunk_protocol::{relay_port, AudioFormat};

use crate::config::ClientConfig;
use crate::control::ControlClient;

/// Wie oft der Audio-Thread den Shutdown prueft
const AUDIO_THREAD_INTERVALL: Duration = Duration::from_millis(50);

/// Fuehrt eine Session bis zum Shutdown aus
///
/// Loest beim Verlassen immer den Shutdown aus, damit alle Threads enden.
pub async fn ausfuehren(
    config: &ClientConfig,
    ptt_rx: Receiver<PttEreignis>,
    shutdown: ShutdownFlag,
) -> anyhow::Result<()> {
    let ergebnis = ausfuehren_intern(config, ptt_rx, &shutdown).await;
    shutdown.ausloesen();

    if let Some(fehler) = ergebnis.as_ref().err().and_then(|e| e.downcast_ref::<LanfunkError>()) {
        if fehler.ist_gegenstelle() {
            tracing::error!(fehler = %fehler, "Server nicht erreichbar oder Registrierung abgelehnt");
        }
    }
    ergebnis
}

async fn ausfuehren_intern(
    config: &ClientConfig,
    ptt_rx: Receiver<PttEreignis>,
    shutdown: &ShutdownFlag,
) -> anyhow::Result<()> {
    let server_addr = config.server_addr()?;
    let relay_addr = SocketAddr::new(
        server_addr.ip(),
        relay_port(server_addr.port()).context("Server-Port laesst keinen Relay-Port zu")?,
    );
    let format = AudioFormat::default();

    // 1. UDP-Socket
    let lokal: SocketAddr = if server_addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let audio_socket = UdpSocket::bind(lokal).context("UDP-Socket konnte nicht gebunden werden")?;
    audio_socket.set_nonblocking(true)?;
    let audio_port = audio_socket.local_addr()?.port();
    tracing::info!(port = audio_port, relay = %relay_addr, "UDP-Socket gebunden");

    let codec_art = CodecArt::waehlen(format, config.audio.kompression);

    // PTT-Controller
    let gate = PttGate::new();
    let controller = PttController::new(config.audio.ptt_modus.into(), gate.clone());
    let ptt_thread = thread::Builder::new()
        .name("lanfunk-ptt".into())
        .spawn({
            let shutdown = shutdown.clone();
            move || controller.laufen(ptt_rx, shutdown)
        })
        .context("PTT-Thread konnte nicht gestartet werden")?;

    // 2. Audio-Thread
    let senke = UdpPaketSenke::neu(audio_socket.try_clone()?, relay_addr)?;
    let pipeline = CapturePipeline::new(gate, codec_art.erstellen(format), senke);
    let capture_stats = pipeline.stats();
    let (producer_tx, producer_rx) = oneshot::channel();
    let audio_thread = audio_thread_starten(format, pipeline, producer_tx, shutdown.clone())
        .context("Audio-Thread konnte nicht gestartet werden")?;
    let mut producer = producer_rx
        .await
        .context("Audio-Thread vorzeitig beendet")?
        .context("Audio-Streams konnten nicht geoeffnet werden")?;

    // 3. Handshake
    let control =
        ControlClient::verbinden(server_addr, audio_port, config.handshake_timeout()).await?;

    // 4. Playback und Control
    let playback_socket = tokio::net::UdpSocket::from_std(audio_socket)?;
    let mut playback_codec = codec_art.erstellen(format);
    let playback_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            playback_loop(&playback_socket, playback_codec.as_mut(), &mut producer, &shutdown).await
        }
    });
    let control_task = tokio::spawn(control.laufen(shutdown.clone()));

    tracing::info!(
        codec = ?codec_art,
        "Bereit. Enter = Senden umschalten, d/u = Taste druecken/loslassen, q = beenden"
    );

    control_task.await.context("Control-Task abgebrochen")?;
    let playback_stats = playback_task.await.context("Playback-Task abgebrochen")?;

    tokio::task::spawn_blocking(move || {
        let _ = audio_thread.join();
        let _ = ptt_thread.join();
    })
    .await?;

    tracing::info!(
        gesendet = capture_stats.gesendet.load(Ordering::Relaxed),
        sende_fehler = capture_stats.sende_fehler.load(Ordering::Relaxed),
        empfangen = playback_stats.empfangen,
        leer_dekodiert = playback_stats.leer_dekodiert,
        "Session beendet"
    );
    Ok(())
}

/// Startet den Thread, der die cpal-Streams besitzt
///
/// Der Playback-Producer (oder der Fehler beim Oeffnen) wird ueber
/// `producer_tx` zurueckgegeben. Die Streams leben bis zum Shutdown.
fn audio_thread_starten<S: PaketSenke + 'static>(
    format: AudioFormat,
    pipeline: CapturePipeline<S>,
    producer_tx: oneshot::Sender<AudioResult<PlaybackProducer>>,
    shutdown: ShutdownFlag,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("lanfunk-audio".into())
        .spawn(move || {
            let (_capture, _playback, producer) = match streams_oeffnen(format, pipeline) {
                Ok(streams) => streams,
                Err(e) => {
                    tracing::error!(fehler = %e, "Audio-Streams konnten nicht geoeffnet werden");
                    let _ = producer_tx.send(Err(e));
                    return;
                }
            };

            if producer_tx.send(Ok(producer)).is_err() {
                return;
            }

            while !shutdown.ist_ausgeloest() {
                thread::sleep(AUDIO_THREAD_INTERVALL);
            }
            tracing::debug!("Audio-Thread beendet, cpal-Streams werden gedroppt");
        })
}

/// Oeffnet Capture und Playback auf den Standardgeraeten
fn streams_oeffnen<S: PaketSenke + 'static>(
    format: AudioFormat,
    pipeline: CapturePipeline<S>,
) -> AudioResult<(CaptureStream, PlaybackStream, PlaybackProducer)> {
    let host = cpal::default_host();
    let eingabe = host
        .default_input_device()
        .ok_or(AudioError::KeinStandardEingabegeraet)?;
    let ausgabe = host
        .default_output_device()
        .ok_or(AudioError::KeinStandardAusgabegeraet)?;

    tracing::info!(
        eingabe = %eingabe.name().unwrap_or_default(),
        ausgabe = %ausgabe.name().unwrap_or_default(),
        "Audio-Geraete"
    );

    let capture = open_capture_stream(&eingabe, format, pipeline)?;
    let (playback, producer) = open_playback_stream(
        &ausgabe,
        PlaybackConfig {
            format,
            ..PlaybackConfig::default()
        },
    )?;
    Ok((capture, playback, producer))
}

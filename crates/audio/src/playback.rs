//! Audio-Playback via cpal
//!
//! Empfangene Datagramme werden im Netzwerk-Task dekodiert und in einen
//! lock-free Ring-Buffer geschrieben. Der cpal-Callback liest daraus und
//! fuellt fehlende Samples mit Stille auf.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, error, trace, warn};

use lanfunk_core::ShutdownFlag;
use lanfunk_protocol::{AudioFormat, MAX_DATAGRAM_SIZE};

use crate::codec::VoiceCodec;
use crate::error::{AudioError, AudioResult};

/// Wartezeit pro Empfangsversuch, danach wird der Shutdown geprueft
pub const EMPFANGS_INTERVALL: Duration = Duration::from_millis(200);

/// Konfiguration fuer den Audio-Playback
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub format: AudioFormat,
    /// Ring-Buffer Kapazitaet in Samples
    pub buffer_size: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        let format = AudioFormat::default();
        Self {
            // eine Sekunde Puffer
            buffer_size: format.sample_rate.hz() as usize * format.channels as usize,
            format,
        }
    }
}

/// Produziert Samples fuer den Playback-Callback
pub type PlaybackProducer = HeapProd<f32>;

/// Audio-Playback-Stream, spielt ab solange er lebt
pub struct PlaybackStream {
    _stream: Stream,
}

/// Oeffnet einen Playback-Stream auf dem gegebenen Geraet.
///
/// Gibt den Stream und den Ring-Buffer Producer zurueck.
/// Der Consumer laeuft im cpal-Callback-Thread.
pub fn open_playback_stream(
    device: &Device,
    config: PlaybackConfig,
) -> AudioResult<(PlaybackStream, PlaybackProducer)> {
    let sample_rate = config.format.sample_rate.hz();
    let channels = config.format.channels as u16;
    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let rb = HeapRb::<f32>::new(config.buffer_size);
    let (producer, mut consumer) = rb.split();

    let err_fn = |err| error!(fehler = %err, "Playback-Fehler");

    let sample_format = device
        .supported_output_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= sample_rate
                && c.max_sample_rate().0 >= sample_rate
                && c.channels() == channels
        })
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _| {
                let gelesen = consumer.pop_slice(data);
                if gelesen < data.len() {
                    trace!(fehlend = data.len() - gelesen, "Playback Underrun");
                    data[gelesen..].fill(0.0);
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [i16], _| {
                for out in data.iter_mut() {
                    let s = consumer.try_pop().unwrap_or(0.0);
                    *out = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                }
            },
            err_fn,
            None,
        ),
        _ => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {sample_format:?}"
            )))
        }
    }
    .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(sample_rate, channels, "Playback-Stream geoeffnet");

    Ok((
        PlaybackStream { _stream: stream },
        producer,
    ))
}

// ---------------------------------------------------------------------------
// Empfangs-Loop
// ---------------------------------------------------------------------------

/// Ziel fuer dekodierte Samples
pub trait WiedergabeQueue: Send {
    /// Schreibt so viele Samples wie Platz ist, gibt die Anzahl zurueck
    fn schreiben(&mut self, samples: &[f32]) -> usize;
}

impl WiedergabeQueue for PlaybackProducer {
    fn schreiben(&mut self, samples: &[f32]) -> usize {
        self.push_slice(samples)
    }
}

/// Zaehler des Empfangs-Loops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStats {
    pub empfangen: u64,
    pub leer_dekodiert: u64,
    pub verworfene_samples: u64,
}

/// Empfaengt Datagramme bis der Shutdown ausgeloest wird
///
/// Jedes Datagramm wird einzeln dekodiert. Ein leeres Dekodier-Ergebnis
/// schreibt nichts, die Luecke wird im Callback als Stille gespielt.
/// Ist die Queue voll, werden die ueberzaehligen Samples verworfen.
pub async fn playback_loop<Q: WiedergabeQueue>(
    socket: &UdpSocket,
    codec: &mut dyn VoiceCodec,
    queue: &mut Q,
    shutdown: &ShutdownFlag,
) -> PlaybackStats {
    let mut stats = PlaybackStats::default();
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    while !shutdown.ist_ausgeloest() {
        let (len, von) =
            match tokio::time::timeout(EMPFANGS_INTERVALL, socket.recv_from(&mut buf)).await {
                Ok(Ok(empfangen)) => empfangen,
                Ok(Err(e)) => {
                    warn!(fehler = %e, "UDP-Empfangsfehler");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
                Err(_) => continue,
            };

        stats.empfangen += 1;
        let samples = codec.decode(&buf[..len]);
        if samples.is_empty() {
            debug!(%von, bytes = len, "Datagramm nicht dekodierbar, verworfen");
            stats.leer_dekodiert += 1;
            continue;
        }

        let geschrieben = queue.schreiben(&samples);
        if geschrieben < samples.len() {
            trace!(verworfen = samples.len() - geschrieben, "Playback-Queue voll");
            stats.verworfene_samples += (samples.len() - geschrieben) as u64;
        }
    }

    debug!(
        empfangen = stats.empfangen,
        leer = stats.leer_dekodiert,
        "Playback-Loop beendet"
    );
    stats
}

//! Codec-Adapter: PCM-Fenster <-> Datagramm-Nutzlast
//!
//! Zwei Varianten hinter einer gemeinsamen Schnittstelle:
//! - [`OpusCodec`] – komprimiert via audiopus (VoIP-Modus)
//! - [`RawCodec`] – verlustfreier Fallback, i16 little-endian
//!
//! Welche Variante verwendet wird, entscheidet [`CodecArt::waehlen`] einmal
//! beim Start. Aufrufer sehen nur `Box<dyn VoiceCodec>`.
//!
//! Beide Varianten clippen zuerst auf [-1, 1] und quantisieren auf i16
//! (Faktor 32767). Fehler pro Frame werden nie weitergereicht: `encode`
//! liefert `None`, `decode` ein leeres Fenster.

use audiopus::{
    coder::{Decoder, Encoder},
    Application, Channels, SampleRate,
};
use tracing::{debug, info, warn};

use crate::error::{AudioError, AudioResult};
use lanfunk_protocol::codec::{
    AudioFormat, ChannelCount, SampleRate as ProtocolSampleRate, SAMPLE_BREITE,
};
use lanfunk_protocol::MAX_DATAGRAM_SIZE;

/// Skalierung zwischen normalisiertem f32 und i16
const I16_SKALA: f32 = 32767.0;

/// Gemeinsame Schnittstelle beider Codec-Varianten
pub trait VoiceCodec: Send {
    /// Kodiert ein PCM-Fenster. `None` bedeutet: Frame verwerfen.
    fn encode(&mut self, fenster: &[f32]) -> Option<Vec<u8>>;

    /// Dekodiert eine Nutzlast. Bei jedem Fehler ein leeres Fenster.
    fn decode(&mut self, daten: &[u8]) -> Vec<f32>;

    /// Kurzname fuer Logs
    fn name(&self) -> &'static str;
}

/// Clippt auf [-1, 1] und quantisiert auf i16
pub fn quantisieren(fenster: &[f32]) -> Vec<i16> {
    fenster
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * I16_SKALA) as i16)
        .collect()
}

fn normalisieren(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / I16_SKALA).collect()
}

// ---------------------------------------------------------------------------
// RawCodec
// ---------------------------------------------------------------------------

/// Unkomprimierter Fallback: 2 Bytes pro Sample, little-endian
#[derive(Debug, Default, Clone)]
pub struct RawCodec;

impl RawCodec {
    pub fn new() -> Self {
        Self
    }
}

impl VoiceCodec for RawCodec {
    fn encode(&mut self, fenster: &[f32]) -> Option<Vec<u8>> {
        let bytes = quantisieren(fenster)
            .into_iter()
            .flat_map(i16::to_le_bytes)
            .collect();
        Some(bytes)
    }

    fn decode(&mut self, daten: &[u8]) -> Vec<f32> {
        if daten.len() % SAMPLE_BREITE != 0 {
            debug!(bytes = daten.len(), "Raw-Nutzlast mit ungerader Laenge verworfen");
            return Vec::new();
        }
        let samples: Vec<i16> = daten
            .chunks_exact(SAMPLE_BREITE)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        normalisieren(&samples)
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}

// ---------------------------------------------------------------------------
// OpusCodec
// ---------------------------------------------------------------------------

/// Opus-Codec mit fester Frame-Groesse
pub struct OpusCodec {
    encoder: Encoder,
    decoder: Decoder,
    /// Samples pro Frame ueber alle Kanaele
    frame_samples: usize,
    channels: usize,
}

impl OpusCodec {
    /// Erstellt Encoder und Decoder fuer das gegebene Format
    pub fn new(format: AudioFormat) -> AudioResult<Self> {
        let sample_rate = protocol_rate_to_audiopus(format.sample_rate);
        let channels = protocol_channels_to_audiopus(format.channels);

        let encoder = Encoder::new(sample_rate, channels, Application::Voip)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        let decoder = Decoder::new(sample_rate, channels)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        let frame_samples = format.samples_pro_frame();

        debug!(
            "OpusCodec erstellt: {:?} {:?} frame_samples={}",
            format.sample_rate, format.channels, frame_samples
        );

        Ok(Self {
            encoder,
            decoder,
            frame_samples,
            channels: format.channels as usize,
        })
    }

    /// Gibt die erwartete Frame-Groesse in Samples zurueck
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }
}

impl VoiceCodec for OpusCodec {
    fn encode(&mut self, fenster: &[f32]) -> Option<Vec<u8>> {
        if fenster.len() != self.frame_samples {
            debug!(
                erwartet = self.frame_samples,
                erhalten = fenster.len(),
                "Fenster mit falscher Laenge nicht kodiert"
            );
            return None;
        }

        let pcm = quantisieren(fenster);
        let mut output = vec![0u8; MAX_DATAGRAM_SIZE];
        match self.encoder.encode(&pcm, &mut output) {
            Ok(geschrieben) => {
                output.truncate(geschrieben);
                Some(output)
            }
            Err(e) => {
                debug!(fehler = %e, "Opus-Encoding fehlgeschlagen, Frame verworfen");
                None
            }
        }
    }

    fn decode(&mut self, daten: &[u8]) -> Vec<f32> {
        if daten.is_empty() {
            return Vec::new();
        }

        let mut output = vec![0i16; self.frame_samples];
        let dekodiert = match self.decoder.decode(Some(daten), &mut output, false) {
            Ok(n) => n * self.channels,
            Err(e) => {
                debug!(fehler = %e, bytes = daten.len(), "Opus-Decoding fehlgeschlagen");
                return Vec::new();
            }
        };

        if dekodiert != self.frame_samples {
            debug!(
                erwartet = self.frame_samples,
                erhalten = dekodiert,
                "Opus-Frame mit unerwarteter Laenge verworfen"
            );
            return Vec::new();
        }
        normalisieren(&output)
    }

    fn name(&self) -> &'static str {
        "opus"
    }
}

// ---------------------------------------------------------------------------
// Auswahl beim Start
// ---------------------------------------------------------------------------

/// Die beim Start gewaehlte Codec-Variante
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecArt {
    Opus,
    Raw,
}

impl CodecArt {
    /// Waehlt die Variante einmalig beim Start
    ///
    /// Opus nur wenn bevorzugt und Encoder/Decoder sich initialisieren
    /// lassen; sonst Raw-Fallback.
    pub fn waehlen(format: AudioFormat, kompression_bevorzugt: bool) -> Self {
        if !kompression_bevorzugt {
            info!("Kompression deaktiviert, verwende Raw-Codec");
            return Self::Raw;
        }
        match OpusCodec::new(format) {
            Ok(_) => {
                info!("Opus verfuegbar, verwende Opus-Codec");
                Self::Opus
            }
            Err(e) => {
                warn!(fehler = %e, "Opus nicht verfuegbar, verwende Raw-Fallback");
                Self::Raw
            }
        }
    }

    /// Erstellt eine Codec-Instanz dieser Variante
    ///
    /// Jeder Ausfuehrungskontext (Capture-Callback, Playback-Loop) bekommt
    /// eine eigene Instanz.
    pub fn erstellen(&self, format: AudioFormat) -> Box<dyn VoiceCodec> {
        match self {
            Self::Opus => match OpusCodec::new(format) {
                Ok(codec) => Box::new(codec),
                Err(e) => {
                    warn!(fehler = %e, "Opus-Instanz fehlgeschlagen, verwende Raw-Fallback");
                    Box::new(RawCodec::new())
                }
            },
            Self::Raw => Box::new(RawCodec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Konvertierungs-Hilfsfunktionen
// ---------------------------------------------------------------------------

fn protocol_rate_to_audiopus(rate: ProtocolSampleRate) -> SampleRate {
    match rate {
        ProtocolSampleRate::Hz16000 => SampleRate::Hz16000,
        ProtocolSampleRate::Hz24000 => SampleRate::Hz24000,
        ProtocolSampleRate::Hz48000 => SampleRate::Hz48000,
    }
}

fn protocol_channels_to_audiopus(ch: ChannelCount) -> Channels {
    match ch {
        ChannelCount::Mono => Channels::Mono,
        ChannelCount::Stereo => Channels::Stereo,
    }
}

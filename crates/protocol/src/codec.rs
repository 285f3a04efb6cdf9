//! Audio-Format fuer den UDP-Audio-Kanal
//!
//! Alle Teilnehmer verwenden dasselbe, beim Start festgelegte Format.
//! Ein Datagramm traegt genau einen kodierten Frame ohne Header; die
//! Datagramm-Grenze ist die Frame-Grenze.

use serde::{Deserialize, Serialize};

/// Maximale Nutzlast eines Audio-Datagramms in Bytes
///
/// Muss groesser sein als jeder unkomprimierte Fallback-Frame. Der
/// groesste ist 48 kHz Stereo mit 40 ms: 3840 Samples * 2 Bytes = 7680 Bytes.
pub const MAX_DATAGRAM_SIZE: usize = 8192;

/// Bytes pro Sample im unkomprimierten Format (i16)
pub const SAMPLE_BREITE: usize = 2;

// ---------------------------------------------------------------------------
// Format-Bausteine
// ---------------------------------------------------------------------------

/// Abtastrate
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRate {
    /// 16 kHz – Breitband
    Hz16000 = 16000,
    /// 24 kHz – Superbreitband
    Hz24000 = 24000,
    /// 48 kHz – Vollband
    #[default]
    Hz48000 = 48000,
}

impl SampleRate {
    /// Abtastrate in Hz
    pub fn hz(&self) -> u32 {
        *self as u32
    }
}

/// Anzahl der Audio-Kanaele
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelCount {
    /// Mono – fuer Sprache
    #[default]
    Mono = 1,
    /// Stereo
    Stereo = 2,
}

/// Frame-Dauer in Millisekunden
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSizeMs {
    /// 10 ms
    Ms10 = 10,
    /// 20 ms – Standard
    #[default]
    Ms20 = 20,
    /// 40 ms
    Ms40 = 40,
}

impl FrameSizeMs {
    /// Berechnet die Anzahl der Samples pro Kanal und Frame
    pub fn samples_per_frame(&self, sample_rate: SampleRate) -> usize {
        (*self as usize) * sample_rate.hz() as usize / 1000
    }
}

// ---------------------------------------------------------------------------
// AudioFormat
// ---------------------------------------------------------------------------

/// Systemweit festes Audio-Format
///
/// Standard: 48 kHz, Mono, 20 ms = 960 Samples pro Frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFormat {
    pub sample_rate: SampleRate,
    pub channels: ChannelCount,
    pub frame_size: FrameSizeMs,
}

impl AudioFormat {
    /// Anzahl der Samples eines Frames (ueber alle Kanaele)
    pub fn samples_pro_frame(&self) -> usize {
        self.frame_size.samples_per_frame(self.sample_rate) * self.channels as usize
    }

    /// Groesse eines unkomprimierten Fallback-Frames in Bytes
    pub fn raw_frame_bytes(&self) -> usize {
        self.samples_pro_frame() * SAMPLE_BREITE
    }
}

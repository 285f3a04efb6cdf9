//! lanfunk-audio – Client Audio-Pipeline
//!
//! - Mikrofon-Capture via cpal, gesteuert durch Push-to-Talk
//! - Lautsprecher-Playback via cpal und lock-free Ring-Buffer
//! - Opus Encoding/Decoding mit Raw-PCM als Fallback

pub mod capture;
pub mod codec;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod ptt;

pub use capture::{open_capture_stream, CaptureStream};
pub use codec::{CodecArt, OpusCodec, RawCodec, VoiceCodec};
pub use error::{AudioError, AudioResult};
pub use pipeline::{
    CapturePipeline, CaptureStats, FrameErgebnis, FrameSammler, PaketSenke, UdpPaketSenke,
};
pub use playback::{
    open_playback_stream, playback_loop, PlaybackConfig, PlaybackProducer, PlaybackStats,
    PlaybackStream, WiedergabeQueue,
};
pub use ptt::{PttController, PttEreignis, PttGate, PttMode};

//! Mikrofon-Capture via cpal
//!
//! Oeffnet einen cpal InputStream. Der Callback sammelt Samples zu festen
//! Fenstern und gibt jedes Fenster direkt an die [`CapturePipeline`].

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use tracing::{debug, error};

use lanfunk_protocol::AudioFormat;

use crate::error::{AudioError, AudioResult};
use crate::pipeline::{CapturePipeline, FrameSammler, PaketSenke};

/// Audio-Capture-Stream
///
/// Haelt den cpal-Stream am Leben. Wird der CaptureStream gedroppt,
/// stoppt die Aufnahme automatisch.
pub struct CaptureStream {
    _stream: Stream,
}

/// Oeffnet einen Capture-Stream auf dem gegebenen Geraet.
///
/// Die Pipeline wandert in den cpal-Callback-Thread.
pub fn open_capture_stream<S: PaketSenke + 'static>(
    device: &Device,
    format: AudioFormat,
    mut pipeline: CapturePipeline<S>,
) -> AudioResult<CaptureStream> {
    let sample_rate = format.sample_rate.hz();
    let channels = format.channels as u16;
    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = |err| error!(fehler = %err, "Capture-Fehler");

    let sample_format = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= sample_rate
                && c.max_sample_rate().0 >= sample_rate
                && c.channels() == channels
        })
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let mut sammler = FrameSammler::new(format.samples_pro_frame());
    // Wiederverwendeter Puffer fuer Ganzzahl-Formate, waechst im Callback nie
    let mut umwandlung: Vec<f32> = Vec::with_capacity(format.samples_pro_frame());

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| {
                sammler.hinzufuegen(data, |fenster| {
                    pipeline.frame_verarbeiten(fenster);
                });
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| {
                let wandeln = |s: i16| s as f32 / i16::MAX as f32;
                blockweise_umwandeln(data, &mut umwandlung, wandeln, |block| {
                    sammler.hinzufuegen(block, |fenster| {
                        pipeline.frame_verarbeiten(fenster);
                    });
                });
            },
            err_fn,
            None,
        ),
        SampleFormat::U8 => device.build_input_stream(
            &stream_config,
            move |data: &[u8], _| {
                let wandeln = |s: u8| (s as f32 - 128.0) / 128.0;
                blockweise_umwandeln(data, &mut umwandlung, wandeln, |block| {
                    sammler.hinzufuegen(block, |fenster| {
                        pipeline.frame_verarbeiten(fenster);
                    });
                });
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

    debug!(sample_rate, channels, ?sample_format, "Capture-Stream geoeffnet");

    Ok(CaptureStream { _stream: stream })
}

/// Wandelt Ganzzahl-Samples in Bloecken von hoechstens `puffer.capacity()`
/// Samples um und uebergibt jeden Block an `block`
///
/// Der Puffer wird nie vergroessert, auch wenn das Geraet laengere
/// Callback-Puffer liefert als vorgesehen.
fn blockweise_umwandeln<T: Copy>(
    data: &[T],
    puffer: &mut Vec<f32>,
    wandeln: impl Fn(T) -> f32,
    mut block: impl FnMut(&[f32]),
) {
    let blockgroesse = puffer.capacity().max(1);
    for teil in data.chunks(blockgroesse) {
        puffer.clear();
        puffer.extend(teil.iter().map(|&s| wandeln(s)));
        block(&puffer[..]);
    }
}

//! PCM "encoder": converts captured audio and packs it into frames.

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::FormatPreset;
use crate::encoder::Encoder;
use crate::format::{i16_to_le_bytes, AudioFormat, FormatConverter, TrackFormat};
use crate::pipeline::AudioBuffer;
use crate::source::CaptureSource;
use crate::{ChannelConfig, Frame, FrameFlags, StreamError, TrackKind};

/// Microseconds per second, for frame timestamps.
const MICROS_PER_SECOND: u64 = 1_000_000;

/// Unread capture beyond this means the pipeline is not keeping up.
const BACKLOG_WARNING: Duration = Duration::from_secs(1);

struct Active {
    buffer: AudioBuffer,
    converter: FormatConverter,
    format: AudioFormat,
    pending: VecDeque<Frame>,
    /// Output frames (samples per channel) emitted so far.
    frames_out: u64,
    falling_behind: bool,
}

/// Packages captured audio as little-endian 16-bit PCM frames.
///
/// Each `capture` moves at most one chunk (`chunk_duration`) from the
/// source's ring buffer, converts it to the target preset and queues it as
/// a key frame. Timestamps count output samples from the last `start`.
///
/// # Example
///
/// ```
/// use stream_channel::{ChannelConfig, Encoder, FormatPreset, MockSource, PcmEncoder};
///
/// let mut source = MockSource::new(48000, 2);
/// source.generate_sine(440.0, 100);
///
/// let config = ChannelConfig {
///     format: FormatPreset::Transcription,
///     ..Default::default()
/// };
/// let mut encoder = PcmEncoder::new(source, &config);
/// encoder.start()?;
/// encoder.capture()?;
/// let frame = encoder.pull_output()?;
///
/// // 20ms of 16kHz mono, two bytes per sample
/// assert_eq!(frame.len(), 640);
/// # Ok::<(), stream_channel::StreamError>(())
/// ```
pub struct PcmEncoder {
    name: String,
    source: Box<dyn CaptureSource>,
    preset: FormatPreset,
    chunk_duration: Duration,
    ring_buffer_duration: Duration,
    active: Option<Active>,
}

impl PcmEncoder {
    /// Creates an encoder over `source`, using the format and buffering of `config`.
    pub fn new<S: CaptureSource + 'static>(source: S, config: &ChannelConfig) -> Self {
        Self::from_boxed(Box::new(source), config)
    }

    /// Creates an encoder over an already boxed source.
    pub fn from_boxed(source: Box<dyn CaptureSource>, config: &ChannelConfig) -> Self {
        Self {
            name: format!("pcm:{}", source.name()),
            source,
            preset: config.format,
            chunk_duration: config.chunk_duration,
            ring_buffer_duration: config.ring_buffer_duration,
            active: None,
        }
    }

    /// Returns `true` between `start` and `stop`.
    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }

    /// Number of frames waiting to be pulled.
    pub fn pending(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.pending.len())
    }

    fn active_mut(&mut self) -> Result<&mut Active, StreamError> {
        self.active
            .as_mut()
            .ok_or_else(|| StreamError::not_started("pcm encoder"))
    }
}

impl Encoder for PcmEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> Result<TrackFormat, StreamError> {
        self.active
            .as_ref()
            .map(|a| TrackFormat::Audio(a.format))
            .ok_or_else(|| StreamError::not_started("pcm encoder"))
    }

    fn start(&mut self) -> Result<(), StreamError> {
        if self.active.is_some() {
            return Ok(());
        }

        let (native_rate, native_channels) = self.source.native_format()?;
        if native_rate == 0 || native_channels == 0 {
            return Err(StreamError::configuration(format!(
                "source {} reports an empty format ({native_rate}Hz/{native_channels}ch)",
                self.source.name()
            )));
        }
        let (target_rate, target_channels) = self.preset.resolve((native_rate, native_channels));

        let capacity = (f64::from(native_rate) * self.ring_buffer_duration.as_secs_f64()) as usize
            * native_channels as usize;
        let consumer = self.source.start(capacity)?;

        let buffer = AudioBuffer::new(consumer, native_rate, native_channels, self.chunk_duration);
        tracing::info!(
            "{} starting: source={}Hz/{}ch, target={}Hz/{}ch, chunk={} samples",
            self.name,
            native_rate,
            native_channels,
            target_rate,
            target_channels,
            buffer.chunk_len()
        );

        self.active = Some(Active {
            buffer,
            converter: FormatConverter::new(native_rate, native_channels, target_rate, target_channels),
            format: AudioFormat::pcm16(target_rate, target_channels),
            pending: VecDeque::new(),
            frames_out: 0,
            falling_behind: false,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        if let Some(active) = self.active.take() {
            tracing::debug!(
                encoder = %self.name,
                dropped = active.pending.len(),
                "pcm encoder stopped"
            );
            self.source.stop()?;
        }
        Ok(())
    }

    fn capture(&mut self) -> Result<(), StreamError> {
        self.source.health()?;
        let active = self.active_mut()?;

        let Some(chunk) = active.buffer.try_read_chunk() else {
            return Ok(());
        };

        let backlog = active.buffer.backlog();
        if backlog > BACKLOG_WARNING && !active.falling_behind {
            tracing::warn!(?backlog, "capture backlog growing, pipeline is not keeping up");
            active.falling_behind = true;
        } else if backlog < BACKLOG_WARNING / 2 && active.falling_behind {
            tracing::info!(?backlog, "capture backlog recovered");
            active.falling_behind = false;
        }
        let converted = active.converter.convert(&chunk);
        if converted.is_empty() {
            return Ok(());
        }

        let rate = u64::from(active.format.sample_rate);
        let timestamp_us = (active.frames_out * MICROS_PER_SECOND / rate) as i64;
        active.frames_out += (converted.len() / active.format.channels as usize) as u64;

        let frame = Frame::new(i16_to_le_bytes(&converted), timestamp_us, TrackKind::Audio)
            .with_flags(FrameFlags::KEY_FRAME);
        active.pending.push_back(frame);
        Ok(())
    }

    fn pull_output(&mut self) -> Result<Frame, StreamError> {
        let active = self.active_mut()?;
        Ok(active.pending.pop_front().unwrap_or_default())
    }
}

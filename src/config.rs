//! Configuration types for media channels.

use std::time::Duration;

/// Preset audio formats for common use cases.
///
/// These presets configure the sample rate and channel count the encoder
/// converts captured audio to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatPreset {
    /// 44.1kHz stereo - what RTMP ingest servers and AAC encoders expect.
    #[default]
    Broadcast,

    /// 16kHz mono - optimal for speech-to-text services.
    Transcription,

    /// Use the source's native format without conversion.
    Native,
}

impl FormatPreset {
    /// Returns the target sample rate for this preset, or `None` for native.
    #[must_use]
    pub fn sample_rate(&self) -> Option<u32> {
        match self {
            Self::Broadcast => Some(44100),
            Self::Transcription => Some(16000),
            Self::Native => None,
        }
    }

    /// Returns the target channel count for this preset, or `None` for native.
    #[must_use]
    pub fn channels(&self) -> Option<u16> {
        match self {
            Self::Broadcast => Some(2),
            Self::Transcription => Some(1),
            Self::Native => None,
        }
    }

    /// Resolves the preset against a source's native `(sample_rate, channels)`.
    #[must_use]
    pub fn resolve(&self, native: (u32, u16)) -> (u32, u16) {
        (
            self.sample_rate().unwrap_or(native.0),
            self.channels().unwrap_or(native.1),
        )
    }
}

/// Target spacing between the starts of consecutive pipeline cycles.
///
/// # Example
///
/// ```
/// use stream_channel::CycleInterval;
/// use std::time::Duration;
///
/// assert_eq!(CycleInterval::from_millis(0), CycleInterval::Immediate);
/// assert_eq!(CycleInterval::from_millis(-1), CycleInterval::SingleShot);
/// assert_eq!(
///     CycleInterval::from_millis(20),
///     CycleInterval::Every(Duration::from_millis(20))
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleInterval {
    /// Run cycles back to back, yielding the CPU between them.
    #[default]
    Immediate,
    /// Start a cycle at most once per period.
    Every(Duration),
    /// Run exactly one cycle, then stop.
    SingleShot,
}

impl CycleInterval {
    /// Maps a signed millisecond interval: zero is immediate, negative is
    /// single-shot, positive is a fixed period.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        match millis {
            0 => Self::Immediate,
            m if m < 0 => Self::SingleShot,
            m => Self::Every(Duration::from_millis(m.unsigned_abs())),
        }
    }

    /// Returns the pacing period, or `None` in single-shot mode.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        match self {
            Self::Immediate => Some(Duration::ZERO),
            Self::Every(period) => Some(*period),
            Self::SingleShot => None,
        }
    }
}

/// What happens to encoder and transport between a failure and the restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPolicy {
    /// Stop and rebuild encoder and transport before the restarted run.
    #[default]
    Reacquire,
    /// Keep the existing encoder and transport running.
    Reuse,
}

/// Configuration for channel behavior.
///
/// Use [`ChannelConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use stream_channel::{ChannelConfig, CycleInterval};
/// use std::time::Duration;
///
/// let config = ChannelConfig {
///     retry_attempts: 3,
///     retry_period: Duration::from_secs(2),
///     ..Default::default()
/// };
/// assert_eq!(config.interval, CycleInterval::Every(Duration::from_millis(10)));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Spacing between cycle starts.
    ///
    /// Default: half of `chunk_duration`, so a full chunk is never left
    /// waiting for more than half a chunk.
    pub interval: CycleInterval,

    /// Delay before an automatic restart after a failed run.
    ///
    /// Default: 5 seconds
    pub retry_period: Duration,

    /// Number of automatic restarts before a failure becomes terminal.
    ///
    /// Default: 0 (first failure stops the channel)
    pub retry_attempts: u32,

    /// Whether encoder and transport are rebuilt before a restart.
    ///
    /// Default: [`RecoveryPolicy::Reacquire`]
    pub recovery: RecoveryPolicy,

    /// Target audio format.
    ///
    /// Default: [`FormatPreset::Broadcast`] (44.1kHz stereo)
    pub format: FormatPreset,

    /// Duration of audio the encoder packs into one frame.
    ///
    /// Default: 20ms
    pub chunk_duration: Duration,

    /// Capacity of the capture ring buffer.
    ///
    /// Absorbs capture while the transport is slow or a restart is pending.
    /// Default: 30 seconds
    pub ring_buffer_duration: Duration,
}

/// Default duration of one encoded chunk.
const DEFAULT_CHUNK_DURATION: Duration = Duration::from_millis(20);

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            interval: CycleInterval::Every(DEFAULT_CHUNK_DURATION / 2),
            retry_period: Duration::from_secs(5),
            retry_attempts: 0,
            recovery: RecoveryPolicy::default(),
            format: FormatPreset::default(),
            chunk_duration: DEFAULT_CHUNK_DURATION,
            ring_buffer_duration: Duration::from_secs(30),
        }
    }
}

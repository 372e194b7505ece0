//! Builder pattern for `Stream`.

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::encoder::{Encoder, PcmEncoder};
use crate::pipeline::MediaChannel;
use crate::source::CaptureSource;
use crate::stream::Stream;
use crate::transport::{ChannelTransport, Transport, WavTransport};
use crate::{
    event_callback, ChannelConfig, CycleInterval, EventCallback, FormatPreset, Frame,
    RecoveryPolicy, StreamError, StreamEvent,
};

/// Default channel name, used in thread names and log fields.
const DEFAULT_NAME: &str = "stream";

/// What the stream encodes from.
enum EncoderSelection {
    /// A ready-made encoder.
    Encoder(Box<dyn Encoder>),
    /// A capture source, wrapped in a [`PcmEncoder`] at build time so it
    /// picks up the final configuration.
    Source(Box<dyn CaptureSource>),
}

/// Builder for configuring a [`Stream`].
///
/// Use [`Stream::builder()`] to create a new builder.
///
/// # Example
///
/// ```no_run
/// use stream_channel::{FormatPreset, MockSource, RecoveryPolicy, Stream};
/// use std::time::Duration;
///
/// let mut source = MockSource::broadcast();
/// source.generate_sine(440.0, 1000);
///
/// let stream = Stream::builder()
///     .name("mic")
///     .capture_from(source)
///     .format(FormatPreset::Transcription)
///     .wav_file("take.wav")
///     .retry(Duration::from_secs(2), 3)
///     .recovery(RecoveryPolicy::Reacquire)
///     .on_event(|e| tracing::warn!(?e, "stream event"))
///     .build()?;
///
/// stream.start()?;
/// std::thread::sleep(Duration::from_secs(1));
/// stream.stop()?;
/// # Ok::<(), stream_channel::StreamError>(())
/// ```
#[must_use]
pub struct StreamBuilder {
    name: String,
    config: ChannelConfig,
    encoder: Option<EncoderSelection>,
    transport: Option<Box<dyn Transport>>,
    event_callback: Option<EventCallback>,
}

impl Default for StreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            config: ChannelConfig::default(),
            encoder: None,
            transport: None,
            event_callback: None,
        }
    }

    /// Set the stream name.
    ///
    /// Default: `"stream"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set custom channel configuration.
    ///
    /// Replaces everything set so far by [`format()`](Self::format),
    /// [`interval()`](Self::interval), [`recovery()`](Self::recovery) and
    /// [`retry()`](Self::retry).
    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the audio format preset used by [`capture_from()`](Self::capture_from).
    ///
    /// Default: [`FormatPreset::Broadcast`] (44.1kHz stereo)
    pub fn format(mut self, format: FormatPreset) -> Self {
        self.config.format = format;
        self
    }

    /// Set the pause between cycles.
    pub fn interval(mut self, interval: CycleInterval) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set how encoder and transport are treated before a recovery restart.
    pub fn recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.config.recovery = recovery;
        self
    }

    /// Enable automatic recovery: up to `attempts` restarts, each after
    /// waiting `period`.
    ///
    /// Default: no recovery.
    pub fn retry(mut self, period: Duration, attempts: u32) -> Self {
        self.config.retry_period = period;
        self.config.retry_attempts = attempts;
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Events include run starts and stops, and pipeline errors with the
    /// delay before the next recovery attempt.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(StreamEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Use a custom encoder.
    pub fn encoder_with<E: Encoder + 'static>(mut self, encoder: E) -> Self {
        self.encoder = Some(EncoderSelection::Encoder(Box::new(encoder)));
        self
    }

    /// Capture from `source` and package it as PCM frames.
    pub fn capture_from<S: CaptureSource + 'static>(mut self, source: S) -> Self {
        self.encoder = Some(EncoderSelection::Source(Box::new(source)));
        self
    }

    /// Use a custom transport.
    pub fn transport_with<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Write frames to a WAV file.
    pub fn wav_file(self, path: impl AsRef<Path>) -> Self {
        self.transport_with(WavTransport::new(path))
    }

    /// Send frames to a tokio mpsc channel.
    pub fn channel(self, sender: mpsc::Sender<Frame>) -> Self {
        self.transport_with(ChannelTransport::new(sender))
    }

    /// Validates the builder configuration.
    fn validate(&self) -> Result<(), StreamError> {
        if self.encoder.is_none() {
            return Err(StreamError::NoEncoderConfigured);
        }
        if self.transport.is_none() {
            return Err(StreamError::NoTransportConfigured);
        }
        if self.name.is_empty() {
            return Err(StreamError::configuration("stream name must not be empty"));
        }
        if self.config.chunk_duration.is_zero() {
            return Err(StreamError::configuration("chunk duration must be positive"));
        }
        Ok(())
    }

    /// Build a stopped [`Stream`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No encoder or capture source is configured
    /// - No transport is configured
    /// - The name is empty or the chunk duration is zero
    pub fn build(mut self) -> Result<Stream, StreamError> {
        self.validate()?;

        let encoder: Box<dyn Encoder> = match self.encoder.take() {
            Some(EncoderSelection::Encoder(encoder)) => encoder,
            Some(EncoderSelection::Source(source)) => {
                Box::new(PcmEncoder::from_boxed(source, &self.config))
            }
            None => return Err(StreamError::NoEncoderConfigured),
        };
        let transport = self
            .transport
            .take()
            .ok_or(StreamError::NoTransportConfigured)?;

        tracing::debug!(
            stream = %self.name,
            encoder = encoder.name(),
            transport = transport.name(),
            interval = ?self.config.interval,
            retry_attempts = self.config.retry_attempts,
            "building stream"
        );

        let mut channel = MediaChannel::new(self.name, encoder, transport, &self.config);
        if let Some(callback) = self.event_callback {
            channel = channel.with_event_callback(callback);
        }
        Ok(Stream::new(channel))
    }
}

//! Mock capture source for testing without hardware.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;

use crate::format::f32_to_i16;
use crate::source::CaptureSource;
use crate::StreamError;

/// Injects a capture failure into a [`MockSource`] from another thread.
#[derive(Clone)]
pub struct MockFault {
    pending: Arc<Mutex<Option<String>>>,
}

impl MockFault {
    /// Fails the source's next health check with a capture error.
    pub fn trip(&self, reason: impl Into<String>) {
        *self.pending.lock() = Some(reason.into());
    }
}

/// A capture source that replays synthetic audio.
///
/// Every `start` opens a fresh ring buffer pre-filled with all generated
/// samples, so a restarted pipeline sees the recording from the beginning.
/// This allows testing the full pipeline without audio hardware, making it
/// suitable for CI environments.
///
/// # Example
///
/// ```
/// use stream_channel::MockSource;
///
/// let mut mock = MockSource::new(16000, 1);
///
/// // 100ms of silence followed by 100ms of a 440Hz sine wave
/// mock.generate_silence(100);
/// mock.generate_sine(440.0, 100);
///
/// assert_eq!(mock.samples().len(), 3200);
/// ```
pub struct MockSource {
    name: String,
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
    running: bool,
    starts: u32,
    fault: Arc<Mutex<Option<String>>>,
}

impl MockSource {
    /// Creates a new mock source with the given format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            name: "mock".to_string(),
            sample_rate,
            channels,
            samples: Vec::new(),
            running: false,
            starts: 0,
            fault: Arc::default(),
        }
    }

    /// Creates a mock source at 44.1kHz stereo.
    pub fn broadcast() -> Self {
        Self::new(44100, 2)
    }

    /// Sets a custom name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns `true` between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of times capture has been started.
    pub fn starts(&self) -> u32 {
        self.starts
    }

    /// Appends `duration_ms` of silence.
    pub fn generate_silence(&mut self, duration_ms: u64) {
        self.push_frames(duration_ms, |_| 0);
    }

    /// Appends `duration_ms` of a full-scale sine at `frequency` Hz.
    pub fn generate_sine(&mut self, frequency: f64, duration_ms: u64) {
        let step = std::f64::consts::TAU * frequency / f64::from(self.sample_rate);
        self.push_frames(duration_ms, |frame| {
            f32_to_i16((step * frame as f64).sin() as f32)
        });
    }

    /// Appends `duration_ms` of reproducible noise scaled by `amplitude` (0.0 to 1.0).
    pub fn generate_noise(&mut self, duration_ms: u64, amplitude: f64) {
        // xorshift32, fixed seed
        let mut state: u32 = 0x9E37_79B9;
        self.push_frames(duration_ms, |_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let unit = f64::from(state) / f64::from(u32::MAX) * 2.0 - 1.0;
            f32_to_i16((unit * amplitude) as f32)
        });
    }

    /// Adds raw samples directly.
    pub fn add_samples(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
    }

    /// Returns a reference to the accumulated samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Returns the duration of accumulated samples.
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() / self.channels as usize;
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// Appends `duration_ms` worth of frames, every channel carrying `sample(frame)`.
    fn push_frames(&mut self, duration_ms: u64, mut sample: impl FnMut(usize) -> i16) {
        let frames = (u64::from(self.sample_rate) * duration_ms / 1000) as usize;
        let width = usize::from(self.channels.max(1));
        self.samples.reserve(frames * width);
        for frame in 0..frames {
            let value = sample(frame);
            self.samples.extend(std::iter::repeat(value).take(width));
        }
    }

    /// Returns a handle that makes the next health check fail.
    ///
    /// Keep it before moving the source into an encoder.
    pub fn fault_handle(&self) -> MockFault {
        MockFault {
            pending: Arc::clone(&self.fault),
        }
    }
}

impl CaptureSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn native_format(&self) -> Result<(u32, u16), StreamError> {
        Ok((self.sample_rate, self.channels))
    }

    fn start(&mut self, capacity: usize) -> Result<ringbuf::HeapCons<i16>, StreamError> {
        let ring_buffer = HeapRb::<i16>::new(capacity.max(self.samples.len()).max(1));
        let (mut producer, consumer) = ring_buffer.split();
        producer.push_slice(&self.samples);

        self.running = true;
        self.starts += 1;
        tracing::debug!(
            source = %self.name,
            samples = self.samples.len(),
            "mock capture started"
        );
        Ok(consumer)
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.running = false;
        Ok(())
    }

    fn health(&mut self) -> Result<(), StreamError> {
        match self.fault.lock().take() {
            Some(reason) => Err(StreamError::capture(reason)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Consumer, Observer};

    #[test]
    fn test_mock_source_silence() {
        let mut mock = MockSource::new(16000, 1);
        mock.generate_silence(100);

        assert_eq!(mock.samples().len(), 1600);
        assert!(mock.samples().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_mock_source_sine() {
        let mut mock = MockSource::new(16000, 1);
        mock.generate_sine(440.0, 100);

        let samples = mock.samples();
        assert_eq!(samples.len(), 1600);
        assert!(samples.iter().any(|&s| s > 0));
        assert!(samples.iter().any(|&s| s < 0));
    }

    #[test]
    fn test_mock_source_broadcast_stereo() {
        let mut mock = MockSource::broadcast();
        mock.generate_noise(100, 0.5);

        // 44100 * 0.1 * 2 channels
        assert_eq!(mock.samples().len(), 8820);
        assert_eq!(mock.duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_mock_source_replays_on_every_start() {
        let mut mock = MockSource::new(16000, 1);
        mock.add_samples(&[1, 2, 3, 4, 5]);

        let mut first = mock.start(16).unwrap();
        let mut output = Vec::new();
        while let Some(sample) = first.try_pop() {
            output.push(sample);
        }
        assert_eq!(output, vec![1, 2, 3, 4, 5]);
        mock.stop().unwrap();
        assert!(!mock.is_running());

        let second = mock.start(16).unwrap();
        assert_eq!(second.occupied_len(), 5);
        assert_eq!(mock.starts(), 2);
    }

    #[test]
    fn test_mock_fault_fails_one_health_check() {
        let mut mock = MockSource::new(16000, 1);
        let fault = mock.fault_handle();
        assert!(mock.health().is_ok());

        fault.trip("device unplugged");
        let err = mock.health().unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("device unplugged"));
        assert!(mock.health().is_ok());
    }

    #[test]
    fn test_mock_source_grows_small_buffers() {
        let mut mock = MockSource::new(16000, 1);
        mock.generate_silence(100);

        let consumer = mock.start(10).unwrap();
        assert_eq!(consumer.occupied_len(), 1600);
    }
}

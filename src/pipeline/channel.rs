//! Media channel: encoder and transport driven by a pipeline worker.
//!
//! The channel owns the resources and the ordering contract around them:
//!
//! ```text
//! start_encoder:  encoder.start → transport.configure → transport.start → worker.start
//! stop_encoder:   worker.stop → transport.stop → encoder.stop
//! ```
//!
//! Each worker cycle pulls one slice into the encoder and forwards at most
//! one non-empty frame to the transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::RecoveryPolicy;
use crate::encoder::Encoder;
use crate::event::EventCallback;
use crate::pipeline::worker::{Pipeline, PipelineWorker, WorkerHandle, WorkerStatus};
use crate::transport::Transport;
use crate::{ChannelConfig, StreamError, TrackKind};

/// Statistics about a channel since it was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Frames written to the transport.
    pub frames_forwarded: u64,
    /// Payload bytes written to the transport.
    pub bytes_forwarded: u64,
    /// Cycles in which the encoder had no output.
    pub empty_polls: u64,
    /// Automatic restarts after a failed run.
    pub recoveries: u64,
    /// Frames whose timestamp went backwards on their track.
    pub timestamp_regressions: u64,
}

#[derive(Default)]
struct StatsCounters {
    frames_forwarded: AtomicU64,
    bytes_forwarded: AtomicU64,
    empty_polls: AtomicU64,
    recoveries: AtomicU64,
    timestamp_regressions: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            frames_forwarded: self.frames_forwarded.load(Ordering::SeqCst),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::SeqCst),
            empty_polls: self.empty_polls.load(Ordering::SeqCst),
            recoveries: self.recoveries.load(Ordering::SeqCst),
            timestamp_regressions: self.timestamp_regressions.load(Ordering::SeqCst),
        }
    }
}

/// The per-cycle hooks of a channel, plus the resources they use.
pub(crate) struct ChannelCycle {
    name: String,
    encoder: Box<dyn Encoder>,
    transport: Box<dyn Transport>,
    open: bool,
    policy: RecoveryPolicy,
    stats: Arc<StatsCounters>,
    /// Last forwarded timestamp per track (audio, video).
    last_timestamp: [Option<i64>; 2],
}

impl ChannelCycle {
    /// Starts encoder then transport. Rolls back the encoder if the
    /// transport cannot be configured or started.
    fn open(&mut self) -> Result<(), StreamError> {
        if self.open {
            return Ok(());
        }

        self.encoder.start()?;
        let transport = self
            .encoder
            .format()
            .and_then(|format| self.transport.configure(&[format]))
            .and_then(|()| self.transport.start().map_err(StreamError::from));

        if let Err(e) = transport {
            if let Err(stop_err) = self.encoder.stop() {
                tracing::warn!(channel = %self.name, error = %stop_err, "encoder stop failed during rollback");
            }
            return Err(e);
        }

        tracing::debug!(
            channel = %self.name,
            encoder = self.encoder.name(),
            transport = self.transport.name(),
            "resources opened"
        );
        self.open = true;
        self.last_timestamp = [None; 2];
        Ok(())
    }

    /// Stops transport then encoder. Both are stopped even if the first fails.
    fn close(&mut self) -> Result<(), StreamError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let transport = self.transport.stop().map_err(StreamError::from);
        if let Err(e) = &transport {
            tracing::warn!(channel = %self.name, error = %e, "transport stop failed");
        }
        let encoder = self.encoder.stop();
        if let Err(e) = &encoder {
            tracing::warn!(channel = %self.name, error = %e, "encoder stop failed");
        }

        tracing::debug!(channel = %self.name, "resources closed");
        transport.and(encoder)
    }

    fn check_timestamp(&mut self, track: TrackKind, timestamp_us: i64) {
        let slot = &mut self.last_timestamp[match track {
            TrackKind::Audio => 0,
            TrackKind::Video => 1,
        }];
        if let Some(previous) = *slot {
            if timestamp_us < previous {
                self.stats
                    .timestamp_regressions
                    .fetch_add(1, Ordering::SeqCst);
                tracing::warn!(
                    channel = %self.name,
                    %track,
                    previous,
                    timestamp_us,
                    "frame timestamp went backwards"
                );
            }
        }
        *slot = Some(timestamp_us);
    }
}

impl Pipeline for ChannelCycle {
    fn capture(&mut self) -> Result<(), StreamError> {
        self.encoder.capture()
    }

    fn process(&mut self) -> Result<(), StreamError> {
        let frame = self.encoder.pull_output()?;
        if frame.is_empty() {
            self.stats.empty_polls.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }

        self.check_timestamp(frame.track, frame.timestamp_us);
        self.transport.write(&frame)?;

        self.stats
            .bytes_forwarded
            .fetch_add(frame.len() as u64, Ordering::SeqCst);
        let frames = self.stats.frames_forwarded.fetch_add(1, Ordering::SeqCst);
        if frames % 250 == 0 {
            tracing::debug!(
                "{}: forwarded frame #{}, {} bytes, ts={}us",
                self.name,
                frames,
                frame.len(),
                frame.timestamp_us
            );
        }
        Ok(())
    }

    fn recover(&mut self) -> Result<(), StreamError> {
        self.stats.recoveries.fetch_add(1, Ordering::SeqCst);
        match self.policy {
            RecoveryPolicy::Reuse => Ok(()),
            RecoveryPolicy::Reacquire => {
                tracing::info!(channel = %self.name, "reacquiring encoder and transport");
                // Close errors are logged; the reopen decides whether recovery worked
                let _ = self.close();
                self.open()
            }
        }
    }
}

/// Wires an [`Encoder`] and a [`Transport`] to a [`PipelineWorker`].
///
/// # Example
///
/// ```
/// use stream_channel::{ChannelConfig, CycleInterval, MediaChannel, MockSource, PcmEncoder, Transport};
/// use stream_channel::{Frame, TransportError};
/// use std::time::Duration;
///
/// struct Discard;
///
/// impl Transport for Discard {
///     fn name(&self) -> &str {
///         "discard"
///     }
///
///     fn write(&mut self, _frame: &Frame) -> Result<(), TransportError> {
///         Ok(())
///     }
/// }
///
/// let mut source = MockSource::broadcast();
/// source.generate_silence(200);
///
/// let config = ChannelConfig {
///     interval: CycleInterval::Immediate,
///     ..Default::default()
/// };
/// let encoder = PcmEncoder::new(source, &config);
/// let channel = MediaChannel::new("demo", Box::new(encoder), Box::new(Discard), &config);
///
/// channel.start_encoder()?;
/// while channel.stats().frames_forwarded < 10 {
///     std::thread::sleep(Duration::from_millis(1));
/// }
/// channel.stop_encoder()?;
/// # Ok::<(), stream_channel::StreamError>(())
/// ```
pub struct MediaChannel {
    worker: PipelineWorker<ChannelCycle>,
    retry_period: Duration,
    retry_attempts: u32,
    stats: Arc<StatsCounters>,
    lifecycle: Mutex<()>,
}

impl MediaChannel {
    /// Creates a stopped channel.
    pub fn new(
        name: impl Into<String>,
        encoder: Box<dyn Encoder>,
        transport: Box<dyn Transport>,
        config: &ChannelConfig,
    ) -> Self {
        let name = name.into();
        let stats = Arc::new(StatsCounters::default());
        let cycle = ChannelCycle {
            name: name.clone(),
            encoder,
            transport,
            open: false,
            policy: config.recovery,
            stats: Arc::clone(&stats),
            last_timestamp: [None; 2],
        };

        Self {
            worker: PipelineWorker::new(name, cycle).with_interval(config.interval),
            retry_period: config.retry_period,
            retry_attempts: config.retry_attempts,
            stats,
            lifecycle: Mutex::new(()),
        }
    }

    /// Sets the callback that receives worker events.
    #[must_use]
    pub fn with_event_callback(self, callback: EventCallback) -> Self {
        self.worker.set_event_callback(callback);
        self
    }

    /// Opens encoder and transport, then starts the worker.
    ///
    /// A no-op while running. After a terminal failure, the old resources
    /// are closed and reopened before the worker restarts.
    ///
    /// # Errors
    ///
    /// Returns the first failure from the encoder, the transport or the
    /// thread spawn. Anything already started is stopped again.
    pub fn start_encoder(&self) -> Result<(), StreamError> {
        let _lifecycle = self.lifecycle.lock();
        if self.worker.is_running() {
            return Ok(());
        }

        self.worker.with_pipeline(|cycle| {
            if let Err(e) = cycle.close() {
                tracing::warn!(channel = %cycle.name, error = %e, "closing stale resources failed");
            }
            cycle.open()
        })?;

        if let Err(e) = self
            .worker
            .start_with_recovery(self.retry_period, self.retry_attempts)
        {
            let _ = self.worker.with_pipeline(ChannelCycle::close);
            return Err(e);
        }

        tracing::info!(channel = %self.worker.name(), "channel started");
        Ok(())
    }

    /// Stops the worker, then transport, then encoder.
    ///
    /// When this returns no cycle is running and none will start.
    ///
    /// # Errors
    ///
    /// Returns the first error from stopping transport or encoder. Both are
    /// always attempted.
    pub fn stop_encoder(&self) -> Result<(), StreamError> {
        let _lifecycle = self.lifecycle.lock();
        self.worker.stop();
        let result = self.worker.with_pipeline(ChannelCycle::close);
        tracing::info!(channel = %self.worker.name(), "channel stopped");
        result
    }

    /// Returns the channel's name.
    pub fn name(&self) -> &str {
        self.worker.name()
    }

    /// Returns `true` while the worker is running or recovering.
    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Returns the worker state.
    pub fn status(&self) -> WorkerStatus {
        self.worker.status()
    }

    /// The error that ended the most recent failed run, if any.
    pub fn last_error(&self) -> Option<Arc<StreamError>> {
        self.worker.last_error()
    }

    /// Number of runs started, including automatic restarts.
    pub fn run_count(&self) -> u64 {
        self.worker.run_count()
    }

    /// Index of the cycle the current run is on, starting at 1.
    pub fn cycle_count(&self) -> u64 {
        self.worker.cycle_count()
    }

    /// Returns current channel statistics.
    pub fn stats(&self) -> ChannelStats {
        self.stats.snapshot()
    }

    /// Returns a handle that can stop the worker from other threads.
    pub fn handle(&self) -> WorkerHandle {
        self.worker.handle()
    }

    /// Blocks until the worker is stopped or `timeout` elapses.
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        self.worker.wait_until_stopped(timeout)
    }
}

impl Drop for MediaChannel {
    fn drop(&mut self) {
        if let Err(e) = self.stop_encoder() {
            tracing::warn!(channel = %self.worker.name(), error = %e, "stop on drop failed");
        }
    }
}

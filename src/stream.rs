//! Stream handle.

use std::sync::Arc;
use std::time::Duration;

use crate::builder::StreamBuilder;
use crate::pipeline::{MediaChannel, WorkerHandle, WorkerStatus};
use crate::StreamError;

/// Statistics about a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Total frames delivered to the transport.
    pub frames_forwarded: u64,
    /// Total payload bytes delivered to the transport.
    pub bytes_forwarded: u64,
    /// Cycles that produced no frame.
    pub empty_polls: u64,
    /// Automatic recoveries after failures.
    pub recoveries: u64,
    /// Runs started, including recoveries.
    pub runs: u64,
}

/// Handle to a capture-encode-transport stream.
///
/// A `Stream` is returned stopped by [`StreamBuilder::build()`]. Work runs
/// on a dedicated worker thread between [`start()`](Stream::start) and
/// [`stop()`](Stream::stop).
///
/// # Lifecycle
///
/// 1. Created by [`StreamBuilder::build()`]
/// 2. [`start()`](Stream::start) opens encoder and transport and starts the worker
/// 3. Failures are retried per the configured recovery policy
/// 4. [`stop()`](Stream::stop) stops the worker, then transport, then encoder
/// 5. Dropping the `Stream` also stops it (but prefer explicit `stop()`)
///
/// A stopped stream can be started again.
pub struct Stream {
    channel: MediaChannel,
}

impl Stream {
    /// Creates a new builder for configuring a stream.
    pub fn builder() -> StreamBuilder {
        StreamBuilder::new()
    }

    pub(crate) fn new(channel: MediaChannel) -> Self {
        Self { channel }
    }

    /// Starts streaming. A no-op if already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder or transport cannot be started or
    /// the worker thread cannot be spawned. The error is also logged.
    pub fn start(&self) -> Result<(), StreamError> {
        self.channel.start_encoder().map_err(|e| {
            tracing::error!(stream = %self.channel.name(), error = %e, "failed to start stream");
            e
        })
    }

    /// Stops streaming and releases encoder and transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport or encoder fails to stop cleanly.
    pub fn stop(&self) -> Result<(), StreamError> {
        self.channel.stop_encoder()
    }

    /// Returns the stream's name.
    pub fn name(&self) -> &str {
        self.channel.name()
    }

    /// Returns `true` while the stream is running or recovering.
    pub fn is_running(&self) -> bool {
        self.channel.is_running()
    }

    /// Returns the worker state.
    pub fn status(&self) -> WorkerStatus {
        self.channel.status()
    }

    /// Returns current stream statistics.
    pub fn stats(&self) -> StreamStats {
        let channel = self.channel.stats();
        StreamStats {
            frames_forwarded: channel.frames_forwarded,
            bytes_forwarded: channel.bytes_forwarded,
            empty_polls: channel.empty_polls,
            recoveries: channel.recoveries,
            runs: self.channel.run_count(),
        }
    }

    /// The error that ended the most recent failed run, if any.
    pub fn last_error(&self) -> Option<Arc<StreamError>> {
        self.channel.last_error()
    }

    /// Returns a handle that can stop the worker from other threads.
    ///
    /// Stopping through the handle halts cycles but leaves the encoder and
    /// transport open until [`stop()`](Stream::stop) or the next `start()`.
    pub fn handle(&self) -> WorkerHandle {
        self.channel.handle()
    }

    /// Blocks until the stream's worker stops or `timeout` elapses.
    ///
    /// Returns `true` if the worker is stopped.
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        self.channel.wait_until_stopped(timeout)
    }
}

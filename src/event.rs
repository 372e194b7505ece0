//! Runtime events for monitoring pipeline health.
//!
//! Events report worker lifecycle and pipeline failures. A failure event
//! tells the observer whether a restart is scheduled; it is not a return
//! value and the worker keeps its own state regardless of what the
//! observer does.

use std::sync::Arc;
use std::time::Duration;

use crate::StreamError;

/// Runtime events emitted by a [`PipelineWorker`](crate::PipelineWorker).
///
/// # Example
///
/// ```
/// use stream_channel::StreamEvent;
///
/// fn handle_event(event: StreamEvent) {
///     match event {
///         StreamEvent::WorkerStarted { worker, run } => {
///             eprintln!("{worker}: run {run} started");
///         }
///         StreamEvent::WorkerStopped { worker, cycles } => {
///             eprintln!("{worker}: stopped after {cycles} cycles");
///         }
///         StreamEvent::PipelineError { worker, error, recovery_delay } => {
///             if recovery_delay.is_zero() {
///                 eprintln!("{worker}: fatal: {error}");
///             } else {
///                 eprintln!("{worker}: {error}, retrying in {recovery_delay:?}");
///             }
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A run began on the worker thread.
    ///
    /// `run` counts from 1 and includes automatic restarts.
    WorkerStarted {
        /// Name of the worker.
        worker: String,
        /// Run number since the worker was created.
        run: u64,
    },

    /// A run ended, for any reason.
    WorkerStopped {
        /// Name of the worker.
        worker: String,
        /// Number of cycles that ran to completion.
        cycles: u64,
    },

    /// A run ended with an error.
    ///
    /// Emitted exactly once per failed run. A nonzero `recovery_delay`
    /// means the worker restarts after that delay; zero means the failure
    /// is terminal and the worker has stopped.
    PipelineError {
        /// Name of the worker.
        worker: String,
        /// The error that ended the run.
        error: Arc<StreamError>,
        /// Delay before the automatic restart, or zero if none follows.
        recovery_delay: Duration,
    },
}

impl StreamEvent {
    /// Returns `true` for a terminal pipeline failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PipelineError { recovery_delay, .. } if recovery_delay.is_zero())
    }
}

/// Callback type for receiving runtime events.
///
/// Register an event callback via [`StreamBuilder::on_event()`] or
/// [`PipelineWorker::with_event_callback()`].
///
/// The callback runs on the worker thread. Keep it short; the next cycle
/// or the recovery sleep does not start until it returns.
///
/// [`StreamBuilder::on_event()`]: crate::StreamBuilder::on_event
/// [`PipelineWorker::with_event_callback()`]: crate::PipelineWorker::with_event_callback
pub type EventCallback = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// This is a convenience function for creating event callbacks without
/// manually wrapping in `Arc`.
///
/// # Example
///
/// ```
/// use stream_channel::{event_callback, StreamEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(StreamEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_event_debug() {
        let event = StreamEvent::WorkerStopped {
            worker: "audio".to_string(),
            cycles: 100,
        };
        let debug = format!("{:?}", event);
        assert!(debug.contains("WorkerStopped"));
        assert!(debug.contains("100"));
    }

    #[test]
    fn test_pipeline_error_fatality() {
        let error = Arc::new(StreamError::capture("source dropped"));
        let transient = StreamEvent::PipelineError {
            worker: "audio".to_string(),
            error: Arc::clone(&error),
            recovery_delay: Duration::from_secs(5),
        };
        let fatal = StreamEvent::PipelineError {
            worker: "audio".to_string(),
            error,
            recovery_delay: Duration::ZERO,
        };
        assert!(!transient.is_fatal());
        assert!(fatal.is_fatal());
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(StreamEvent::WorkerStarted {
            worker: "audio".to_string(),
            run: 1,
        });
        assert!(called.load(Ordering::SeqCst));
    }
}

//! Error types for stream-channel.
//!
//! Errors are split into two categories:
//! - **Pipeline errors** ([`StreamError`]): returned from start calls and
//!   raised by the capture/process hooks of a running pipeline
//! - **Transport errors** ([`TransportError`]): raised by a
//!   [`Transport`](crate::Transport) while delivering frames
//!
//! Whether a failed run is restarted is decided by [`StreamError::is_retryable`].

use std::path::PathBuf;

/// Broad classification of a [`StreamError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or unsupported configuration. Never retried.
    Configuration,
    /// The capture source or encoder failed.
    Capture,
    /// The muxer/transport failed.
    Transport,
    /// The pipeline was asked to stop. Not a failure.
    Cancelled,
    /// Thread or state-machine failure inside the crate.
    Internal,
}

/// Errors raised while starting or running a media pipeline.
///
/// Returned from [`Stream::start()`](crate::Stream::start) and from the
/// [`Pipeline`](crate::Pipeline) hooks. A hook error ends the current run;
/// the worker then either schedules a restart or stops for good.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The requested format, device or track layout is not supported.
    #[error("configuration error: {reason}")]
    Configuration {
        /// What was rejected.
        reason: String,
    },

    /// The capture source or encoder failed.
    #[error("capture failed: {reason}")]
    Capture {
        /// Description of the failure.
        reason: String,
    },

    /// The requested audio device was not found.
    #[error("device not found: {name}")]
    DeviceNotFound {
        /// Name of the device that wasn't found.
        name: String,
    },

    /// No default input device is configured on this system.
    #[error("no default input device configured")]
    NoDefaultDevice,

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    BackendError(String),

    /// Writing to or opening the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A component was used before it was started.
    #[error("{component} used before start")]
    NotStarted {
        /// Name of the component.
        component: String,
    },

    /// The run was cancelled by a stop request.
    #[error("pipeline cancelled")]
    Cancelled,

    /// The OS refused to spawn the worker thread.
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// No encoder was configured before building the stream.
    #[error("no encoder configured - add a capture source or encoder factory")]
    NoEncoderConfigured,

    /// No transport was configured before building the stream.
    #[error("no transport configured - add a wav file, channel or custom transport")]
    NoTransportConfigured,
}

impl StreamError {
    /// Creates a configuration error with the given reason.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Creates a capture error with the given reason.
    pub fn capture(reason: impl Into<String>) -> Self {
        Self::Capture {
            reason: reason.into(),
        }
    }

    /// Creates a not-started error for the named component.
    pub fn not_started(component: impl Into<String>) -> Self {
        Self::NotStarted {
            component: component.into(),
        }
    }

    /// Returns the broad category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. }
            | Self::DeviceNotFound { .. }
            | Self::NoDefaultDevice
            | Self::NoEncoderConfigured
            | Self::NoTransportConfigured => ErrorKind::Configuration,
            Self::Capture { .. } | Self::BackendError(_) => ErrorKind::Capture,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::NotStarted { .. } | Self::ThreadSpawn(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if a failed run with this error may be restarted.
    ///
    /// Capture and transport failures are transient; configuration and
    /// internal errors would fail again the same way.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Capture | ErrorKind::Transport)
    }

    /// Returns `true` if this is a cancellation rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors that can occur within a [`Transport`](crate::Transport) implementation.
///
/// Transport errors end the current pipeline run. The worker's recovery
/// policy decides whether the run is restarted.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A write operation failed.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// File I/O error.
    #[error("file error: {path}: {source}")]
    FileError {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The receiving channel was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// The transport was written to before `start`.
    #[error("transport not started (call start first)")]
    NotStarted,

    /// Custom error for user-implemented transports.
    #[error("{0}")]
    Custom(String),
}

impl TransportError {
    /// Creates a custom transport error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a write failed error with the given reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Creates a file error for the given path.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileError {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_display() {
        let err = StreamError::DeviceNotFound {
            name: "USB Mic".to_string(),
        };
        assert_eq!(err.to_string(), "device not found: USB Mic");
    }

    #[test]
    fn test_configuration_is_fatal() {
        let err = StreamError::configuration("H265 is not supported by flv");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_device_is_fatal() {
        let err = StreamError::DeviceNotFound {
            name: "USB Mic".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.is_retryable());
        assert!(!StreamError::NoDefaultDevice.is_retryable());
    }

    #[test]
    fn test_capture_and_transport_are_retryable() {
        assert!(StreamError::capture("source dropped").is_retryable());
        assert!(StreamError::from(TransportError::ChannelClosed).is_retryable());
        assert!(StreamError::BackendError("stream invalidated".into()).is_retryable());
    }

    #[test]
    fn test_cancelled_is_not_retryable() {
        let err = StreamError::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_transport_error_wraps_into_stream_error() {
        let err: StreamError = TransportError::write_failed("connection reset").into();
        assert_eq!(err.to_string(), "transport error: write failed: connection reset");
    }

    #[test]
    fn test_transport_error_custom() {
        let err = TransportError::custom("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }

    #[test]
    fn test_transport_error_file_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = TransportError::file_error("/tmp/test.wav", io_err);
        assert!(err.to_string().contains("/tmp/test.wav"));
    }
}

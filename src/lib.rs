//! # stream-channel
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Live capture, encode and transport pipelines driven by a periodic worker.
//!
//! `stream-channel` runs a capture source, an encoder and a transport (file,
//! channel, custom) on a dedicated worker thread, paced by a configurable
//! cycle interval, with bounded automatic recovery when the pipeline fails.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stream_channel::{FormatPreset, MockSource, Stream};
//! use std::time::Duration;
//!
//! let mut source = MockSource::broadcast();
//! source.generate_sine(440.0, 5_000);
//!
//! let stream = Stream::builder()
//!     .name("mic")
//!     .capture_from(source)
//!     .format(FormatPreset::Transcription)           // 16kHz mono
//!     .wav_file("meeting.wav")
//!     .retry(Duration::from_secs(5), 3)
//!     .on_event(|e| tracing::warn!(?e, "stream event"))
//!     .build()?;
//!
//! stream.start()?;
//! std::thread::sleep(Duration::from_secs(5));
//! stream.stop()?;
//! # Ok::<(), stream_channel::StreamError>(())
//! ```
//!
//! ## Architecture
//!
//! The crate keeps a strict thread boundary:
//!
//! - **Capture Thread**: Audio callback that only pushes into a ring buffer
//! - **Ring Buffer**: Lock-free SPSC queue absorbs pressure from slow transports
//! - **Worker Thread**: [`PipelineWorker`] runs `capture` then `process` each
//!   cycle, sleeps for the rest of the interval, and restarts the pipeline
//!   after retryable failures
//!
//! [`MediaChannel`] owns the encoder and transport and orders their start
//! and stop around the worker. [`Stream`] is the public handle over one
//! channel.

// unsafe_code lint is configured in Cargo.toml as "deny"
#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![allow(clippy::unwrap_used)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod config;
mod encoder;
mod error;
mod event;
pub mod format;
mod frame;
mod pipeline;
pub mod source;
mod stream;
mod transport;

pub use builder::StreamBuilder;
pub use config::{ChannelConfig, CycleInterval, FormatPreset, RecoveryPolicy};
pub use encoder::{Encoder, PcmEncoder};
pub use error::{ErrorKind, StreamError, TransportError};
pub use event::{event_callback, EventCallback, StreamEvent};
pub use frame::{Frame, FrameFlags, TrackKind};
pub use pipeline::{
    ChannelStats, MediaChannel, Pipeline, PipelineWorker, WorkerHandle, WorkerStatus,
};
pub use source::{CaptureSource, MockFault, MockSource};
pub use stream::{Stream, StreamStats};
pub use transport::{ChannelTransport, Transport, WavTransport};

#[cfg(feature = "device")]
pub use source::{default_input_device_name, list_input_devices, DeviceSource};

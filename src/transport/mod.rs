//! Transports: where encoded frames go.
//!
//! A [`Transport`] is the muxer/network end of a channel. The crate
//! provides two built-in transports:
//!
//! - [`WavTransport`]: Writes PCM frames to a WAV file
//! - [`ChannelTransport`]: Sends frames to a tokio mpsc channel
//!
//! You can implement the [`Transport`] trait for RTMP, DASH or any other
//! destination.

mod channel;
mod wav;

pub use channel::ChannelTransport;
pub use wav::WavTransport;

use crate::format::TrackFormat;
use crate::{Frame, StreamError, TransportError};

/// A destination for encoded frames.
///
/// # Implementation Notes
///
/// - Methods take `&mut self` and run on the worker thread, one at a time
/// - `configure` is called with the encoder's track formats before every
///   `start`; reject formats you cannot carry with
///   [`StreamError::Configuration`]
/// - `start` is called before any frame flows; open files or connections here
/// - `stop` is called on shutdown and before a restart; close resources here
/// - A failed `write` ends the current pipeline run
///
/// # Example
///
/// ```
/// use stream_channel::{Frame, Transport, TransportError};
///
/// struct PrintTransport;
///
/// impl Transport for PrintTransport {
///     fn name(&self) -> &str {
///         "print"
///     }
///
///     fn write(&mut self, frame: &Frame) -> Result<(), TransportError> {
///         println!("{} bytes at {}us", frame.len(), frame.timestamp_us);
///         Ok(())
///     }
/// }
/// ```
pub trait Transport: Send {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Negotiates the tracks that will be written.
    ///
    /// Default implementation accepts anything.
    fn configure(&mut self, tracks: &[TrackFormat]) -> Result<(), StreamError> {
        let _ = tracks;
        Ok(())
    }

    /// Opens the destination.
    ///
    /// Default implementation does nothing.
    fn start(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Writes one non-empty frame.
    fn write(&mut self, frame: &Frame) -> Result<(), TransportError>;

    /// Flushes and closes the destination.
    ///
    /// Default implementation does nothing.
    fn stop(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

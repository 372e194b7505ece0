//! Encoders: raw capture in, [`Frame`]s out.
//!
//! An [`Encoder`] owns its capture source. The channel drives it from the
//! worker thread: one `capture` then one `pull_output` per cycle.
//!
//! The crate ships [`PcmEncoder`], which packages captured audio as 16-bit
//! PCM frames. Compressing encoders plug in through the same trait.

mod pcm;

pub use pcm::PcmEncoder;

use crate::format::TrackFormat;
use crate::{Frame, StreamError};

/// Turns raw samples into encoded frames.
///
/// # Implementation Notes
///
/// - All methods are called from one thread at a time
/// - `start` opens the capture source; `stop` closes it. Both may be called
///   again after a failure when the channel rebuilds its resources
/// - `pull_output` returns [`Frame::empty()`] when nothing is ready; that
///   is not an error
///
/// # Example
///
/// ```
/// use stream_channel::format::{AudioFormat, TrackFormat};
/// use stream_channel::{Encoder, Frame, StreamError, TrackKind};
///
/// struct Beeper {
///     ticks: i64,
/// }
///
/// impl Encoder for Beeper {
///     fn name(&self) -> &str {
///         "beeper"
///     }
///
///     fn format(&self) -> Result<TrackFormat, StreamError> {
///         Ok(TrackFormat::Audio(AudioFormat::pcm16(8000, 1)))
///     }
///
///     fn start(&mut self) -> Result<(), StreamError> {
///         Ok(())
///     }
///
///     fn stop(&mut self) -> Result<(), StreamError> {
///         Ok(())
///     }
///
///     fn capture(&mut self) -> Result<(), StreamError> {
///         self.ticks += 1;
///         Ok(())
///     }
///
///     fn pull_output(&mut self) -> Result<Frame, StreamError> {
///         Ok(Frame::new(vec![0u8; 16], self.ticks * 1000, TrackKind::Audio))
///     }
/// }
/// ```
pub trait Encoder: Send {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// The track format of the frames this encoder produces.
    ///
    /// May depend on the capture source, so it is only guaranteed to be
    /// available after `start`.
    fn format(&self) -> Result<TrackFormat, StreamError>;

    /// Opens the capture source and prepares encoding.
    fn start(&mut self) -> Result<(), StreamError>;

    /// Closes the capture source. Pending output is discarded.
    fn stop(&mut self) -> Result<(), StreamError>;

    /// Pulls one slice of raw input into the encoder.
    ///
    /// Push-based encoders can leave this as a no-op.
    fn capture(&mut self) -> Result<(), StreamError>;

    /// Takes the next encoded frame, or an empty frame if none is ready.
    fn pull_output(&mut self) -> Result<Frame, StreamError>;
}

//! Capture sources: where raw samples come from.
//!
//! A [`CaptureSource`] hands the encoder the consumer half of a ring buffer
//! on `start` and keeps pushing interleaved i16 samples into it until `stop`.
//!
//! - [`MockSource`]: synthetic samples, no hardware needed
//! - `DeviceSource`: a CPAL input device (requires the `device` feature)

#[cfg(feature = "device")]
mod device;
mod mock;

#[cfg(feature = "device")]
pub use device::{default_input_device_name, list_input_devices, DeviceSource};
pub use mock::{MockFault, MockSource};

use crate::StreamError;

/// A producer of raw interleaved 16-bit samples.
///
/// Sources are owned by an encoder and only touched from the worker thread
/// or while the worker is stopped, so they need to be `Send` but not `Sync`.
pub trait CaptureSource: Send {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// The `(sample_rate, channels)` the source delivers.
    fn native_format(&self) -> Result<(u32, u16), StreamError>;

    /// Starts capture into a ring buffer of `capacity` samples.
    ///
    /// Returns the consumer half. Calling `start` again after `stop` must
    /// return a fresh buffer.
    fn start(&mut self, capacity: usize) -> Result<ringbuf::HeapCons<i16>, StreamError>;

    /// Stops capture and releases the underlying resource.
    fn stop(&mut self) -> Result<(), StreamError>;

    /// Reports asynchronous failures, such as a device being unplugged.
    ///
    /// Polled once per capture cycle. Default implementation never fails.
    fn health(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}

//! Audio format conversion and track descriptions.
//!
//! This module provides:
//! - Sample format conversion (f32 to i16, PCM byte packing)
//! - Channel and sample rate conversion ([`FormatConverter`])
//! - Track formats negotiated between encoders and transports ([`TrackFormat`])

mod convert;
mod resample;
mod track;

pub use convert::{downmix_to_mono, f32_to_i16, i16_to_le_bytes, remix, upmix_mono};
pub use resample::resample;
pub use track::{AudioCodec, AudioFormat, TrackFormat, VideoCodec, VideoFormat};

/// Converts interleaved i16 audio between channel layouts and sample rates.
///
/// Channels are converted first, then the result is resampled, so stereo
/// input headed for a mono target is only resampled once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatConverter {
    source_rate: u32,
    source_channels: u16,
    target_rate: u32,
    target_channels: u16,
}

impl FormatConverter {
    /// Creates a converter from the source format to the target format.
    pub fn new(source_rate: u32, source_channels: u16, target_rate: u32, target_channels: u16) -> Self {
        Self {
            source_rate,
            source_channels,
            target_rate,
            target_channels,
        }
    }

    /// Returns `true` if the converter leaves samples untouched.
    pub fn is_passthrough(&self) -> bool {
        self.source_rate == self.target_rate && self.source_channels == self.target_channels
    }

    /// Returns the target `(sample_rate, channels)`.
    pub fn target(&self) -> (u32, u16) {
        (self.target_rate, self.target_channels)
    }

    /// Converts one chunk of interleaved samples.
    pub fn convert(&self, samples: &[i16]) -> Vec<i16> {
        if self.is_passthrough() {
            return samples.to_vec();
        }

        let remixed = remix(samples, self.source_channels, self.target_channels);
        resample(
            &remixed,
            self.target_channels,
            self.source_rate,
            self.target_rate,
        )
    }
}

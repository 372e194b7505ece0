//! Encoded media frame with timing metadata.

use std::fmt;
use std::ops::BitOr;

use bytes::Bytes;

/// Marker bits attached to a [`Frame`].
///
/// The pipeline never interprets these; they are passed through to the
/// transport untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameFlags(u32);

impl FrameFlags {
    /// No markers.
    pub const NONE: Self = Self(0);
    /// The frame can be decoded without earlier frames.
    pub const KEY_FRAME: Self = Self(1);
    /// The payload carries codec configuration rather than media.
    pub const CODEC_CONFIG: Self = Self(2);
    /// Last frame of the stream.
    pub const END_OF_STREAM: Self = Self(4);

    /// Creates flags from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FrameFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The media track a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackKind {
    /// Audio samples.
    #[default]
    Audio,
    /// Video pictures.
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// One unit of encoded media output.
///
/// A `Frame` is produced by an [`Encoder`](crate::Encoder) once per cycle and
/// consumed once by the transport. An empty payload means "nothing produced
/// this cycle" and is never forwarded.
///
/// The payload is a [`Bytes`] so handing a frame to several consumers does
/// not copy media data.
///
/// # Example
///
/// ```
/// use stream_channel::{Frame, FrameFlags, TrackKind};
///
/// let frame = Frame::new(vec![1u8, 2, 3], 20_000, TrackKind::Audio)
///     .with_flags(FrameFlags::KEY_FRAME);
/// assert!(!frame.is_empty());
/// assert!(Frame::empty().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Marker bits, opaque to the pipeline.
    pub flags: FrameFlags,
    /// Presentation time in microseconds. Non-decreasing per track.
    pub timestamp_us: i64,
    /// Encoded bytes. Empty when the encoder had no output.
    pub payload: Bytes,
    /// Track this frame belongs to.
    pub track: TrackKind,
}

impl Frame {
    /// Creates a frame with no flags set.
    pub fn new(payload: impl Into<Bytes>, timestamp_us: i64, track: TrackKind) -> Self {
        Self {
            flags: FrameFlags::NONE,
            timestamp_us,
            payload: payload.into(),
            track,
        }
    }

    /// Returns the "no output this cycle" frame.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sets the marker bits.
    #[must_use]
    pub fn with_flags(mut self, flags: FrameFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Returns `true` if the payload carries no data.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Returns the payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }
}

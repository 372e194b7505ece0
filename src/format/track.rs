//! Track formats negotiated between an encoder and a transport.

use std::fmt;

use crate::frame::TrackKind;

/// Audio codecs a track can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    /// Uncompressed 16-bit little-endian PCM.
    Pcm16,
    /// AAC low complexity.
    Aac,
}

/// Video codecs a track can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC. Not supported by FLV containers.
    Hevc,
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcm16 => f.write_str("pcm_s16le"),
            Self::Aac => f.write_str("aac"),
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => f.write_str("h264"),
            Self::Hevc => f.write_str("hevc"),
        }
    }
}

/// Parameters of an audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Codec of the payload.
    pub codec: AudioCodec,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Target bitrate in bits per second. For PCM this is derived.
    pub bitrate: u32,
}

impl AudioFormat {
    /// 16-bit PCM at the given rate and channel count.
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            codec: AudioCodec::Pcm16,
            sample_rate,
            channels,
            bitrate: sample_rate * u32::from(channels) * 16,
        }
    }

    /// AAC at 44.1kHz stereo, 128 kbit/s.
    pub fn aac_broadcast() -> Self {
        Self {
            codec: AudioCodec::Aac,
            sample_rate: 44100,
            channels: 2,
            bitrate: 128_000,
        }
    }
}

/// Parameters of a video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    /// Codec of the payload.
    pub codec: VideoCodec,
    /// Picture width in pixels.
    pub width: u32,
    /// Picture height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: u32,
    /// Seconds between key frames.
    pub key_frame_interval: u32,
    /// Target bitrate in bits per second.
    pub bitrate: u32,
}

/// Format of one media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    /// An audio track.
    Audio(AudioFormat),
    /// A video track.
    Video(VideoFormat),
}

impl TrackFormat {
    /// Returns which kind of track this is.
    pub fn kind(&self) -> TrackKind {
        match self {
            Self::Audio(_) => TrackKind::Audio,
            Self::Video(_) => TrackKind::Video,
        }
    }

    /// Returns the audio parameters, if this is an audio track.
    pub fn as_audio(&self) -> Option<&AudioFormat> {
        match self {
            Self::Audio(format) => Some(format),
            Self::Video(_) => None,
        }
    }
}

impl fmt::Display for TrackFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio(a) => write!(f, "{} {}Hz/{}ch", a.codec, a.sample_rate, a.channels),
            Self::Video(v) => write!(f, "{} {}x{}@{}", v.codec, v.width, v.height, v.frame_rate),
        }
    }
}

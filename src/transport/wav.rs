//! WAV file transport.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::format::{AudioCodec, TrackFormat};
use crate::transport::Transport;
use crate::{Frame, StreamError, TrackKind, TransportError};

// WAV file format constants
// See: http://soundfile.sapp.org/doc/WaveFormat/

/// Byte offset of the file size field in WAV header (RIFF chunk size).
const WAV_FILE_SIZE_OFFSET: u64 = 4;

/// Byte offset of the data chunk size field in WAV header.
const WAV_DATA_SIZE_OFFSET: u64 = 40;

/// Size of the WAV header in bytes (RIFF + fmt + data chunk headers).
const WAV_HEADER_SIZE: u32 = 44;

/// Size of the fmt chunk data (16 bytes for PCM).
const WAV_FMT_CHUNK_SIZE: u32 = 16;

/// Audio format code for PCM (uncompressed).
const WAV_FORMAT_PCM: u16 = 1;

/// Bits per sample for 16-bit audio.
const WAV_BITS_PER_SAMPLE: u16 = 16;

struct OpenSegment {
    writer: BufWriter<File>,
    path: PathBuf,
    bytes_written: u64,
}

/// A transport that writes a single 16-bit PCM audio track to a WAV file.
///
/// The file is created on `start` with a placeholder header and finalized
/// (header sizes updated) on `stop`. When the channel restarts after a
/// failure, each further `start` opens a new numbered segment next to the
/// first file: `take.wav`, `take.1.wav`, `take.2.wav`, ...
///
/// # Example
///
/// ```no_run
/// use stream_channel::WavTransport;
///
/// let transport = WavTransport::new("recording.wav");
/// // Use with Stream builder...
/// ```
pub struct WavTransport {
    name: String,
    path: PathBuf,
    format: Option<(u32, u16)>,
    segment: Option<OpenSegment>,
    segments: Vec<PathBuf>,
}

impl WavTransport {
    /// Creates a transport that writes to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            name: format!("wav:{}", path.as_ref().display()),
            path: path.as_ref().to_path_buf(),
            format: None,
            segment: None,
            segments: Vec::new(),
        }
    }

    /// Paths of every segment opened so far, in order.
    pub fn segments(&self) -> &[PathBuf] {
        &self.segments
    }

    /// Flush buffered data to disk.
    ///
    /// Note: This does NOT update the WAV header - that happens on `stop()`.
    pub fn flush(&mut self) -> Result<(), TransportError> {
        if let Some(segment) = self.segment.as_mut() {
            segment
                .writer
                .flush()
                .map_err(|e| TransportError::file_error(&segment.path, e))?;
        }
        Ok(())
    }

    fn segment_path(&self, index: usize) -> PathBuf {
        if index == 0 {
            return self.path.clone();
        }
        let stem = self
            .path
            .file_stem()
            .map_or_else(|| "segment".into(), |s| s.to_string_lossy().into_owned());
        let file_name = match self.path.extension() {
            Some(ext) => format!("{stem}.{index}.{}", ext.to_string_lossy()),
            None => format!("{stem}.{index}"),
        };
        self.path.with_file_name(file_name)
    }

    /// Writes a complete WAV header with the given parameters.
    ///
    /// The header includes RIFF, fmt, and data chunk headers (44 bytes total).
    fn write_wav_header(
        writer: &mut impl Write,
        sample_rate: u32,
        channels: u16,
        data_size: u32,
    ) -> std::io::Result<()> {
        // RIFF container header
        writer.write_all(b"RIFF")?;
        let file_size = (WAV_HEADER_SIZE - 8).saturating_add(data_size);
        writer.write_all(&file_size.to_le_bytes())?;
        writer.write_all(b"WAVE")?;

        // fmt subchunk
        writer.write_all(b"fmt ")?;
        writer.write_all(&WAV_FMT_CHUNK_SIZE.to_le_bytes())?;
        writer.write_all(&WAV_FORMAT_PCM.to_le_bytes())?;
        writer.write_all(&channels.to_le_bytes())?;
        writer.write_all(&sample_rate.to_le_bytes())?;

        let bytes_per_sample = WAV_BITS_PER_SAMPLE / 8;
        let byte_rate = sample_rate * u32::from(channels) * u32::from(bytes_per_sample);
        writer.write_all(&byte_rate.to_le_bytes())?;

        let block_align = channels * bytes_per_sample;
        writer.write_all(&block_align.to_le_bytes())?;
        writer.write_all(&WAV_BITS_PER_SAMPLE.to_le_bytes())?;

        // data subchunk header
        writer.write_all(b"data")?;
        writer.write_all(&data_size.to_le_bytes())?;

        Ok(())
    }

    /// Updates the WAV header with the final data size after recording.
    fn update_wav_header(writer: &mut BufWriter<File>, data_size: u32) -> std::io::Result<()> {
        let file_size = (WAV_HEADER_SIZE - 8).saturating_add(data_size);
        writer.seek(SeekFrom::Start(WAV_FILE_SIZE_OFFSET))?;
        writer.write_all(&file_size.to_le_bytes())?;

        writer.seek(SeekFrom::Start(WAV_DATA_SIZE_OFFSET))?;
        writer.write_all(&data_size.to_le_bytes())?;

        writer.seek(SeekFrom::End(0))?;
        Ok(())
    }
}

impl Transport for WavTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, tracks: &[TrackFormat]) -> Result<(), StreamError> {
        match tracks {
            [TrackFormat::Audio(audio)] if audio.codec == AudioCodec::Pcm16 => {
                self.format = Some((audio.sample_rate, audio.channels));
                Ok(())
            }
            [TrackFormat::Audio(audio)] => Err(StreamError::configuration(format!(
                "{} cannot carry {} audio, only pcm_s16le",
                self.name, audio.codec
            ))),
            _ => Err(StreamError::configuration(format!(
                "{} carries exactly one audio track, got {}",
                self.name,
                tracks.len()
            ))),
        }
    }

    fn start(&mut self) -> Result<(), TransportError> {
        if self.segment.is_some() {
            return Ok(());
        }
        let (sample_rate, channels) = self.format.ok_or(TransportError::NotStarted)?;

        let path = self.segment_path(self.segments.len());
        let file = File::create(&path).map_err(|e| TransportError::file_error(&path, e))?;
        let mut writer = BufWriter::new(file);

        // Placeholder sizes, updated on stop
        Self::write_wav_header(&mut writer, sample_rate, channels, 0)
            .map_err(|e| TransportError::file_error(&path, e))?;

        tracing::info!("{} opened {}", self.name, path.display());
        self.segments.push(path.clone());
        self.segment = Some(OpenSegment {
            writer,
            path,
            bytes_written: 0,
        });
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if frame.track != TrackKind::Audio {
            return Err(TransportError::write_failed(format!(
                "{} received a {} frame",
                self.name, frame.track
            )));
        }
        let segment = self.segment.as_mut().ok_or(TransportError::NotStarted)?;

        tracing::trace!(
            "{}: writing {} bytes, ts={}us",
            self.name,
            frame.len(),
            frame.timestamp_us
        );
        segment
            .writer
            .write_all(&frame.payload)
            .map_err(|e| TransportError::file_error(&segment.path, e))?;
        segment.bytes_written += frame.len() as u64;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        let Some(mut segment) = self.segment.take() else {
            return Ok(());
        };
        let data_size = u32::try_from(segment.bytes_written).unwrap_or(u32::MAX);

        Self::update_wav_header(&mut segment.writer, data_size)
            .map_err(|e| TransportError::file_error(&segment.path, e))?;
        segment
            .writer
            .flush()
            .map_err(|e| TransportError::file_error(&segment.path, e))?;

        tracing::info!(
            "{} finalized {} ({} bytes of audio)",
            self.name,
            segment.path.display(),
            segment.bytes_written
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{AudioFormat, VideoCodec, VideoFormat};
    use tempfile::tempdir;

    fn pcm_frame(samples: &[i16]) -> Frame {
        Frame::new(crate::format::i16_to_le_bytes(samples), 0, TrackKind::Audio)
    }

    fn started(path: &Path, sample_rate: u32, channels: u16) -> WavTransport {
        let mut transport = WavTransport::new(path);
        transport
            .configure(&[TrackFormat::Audio(AudioFormat::pcm16(sample_rate, channels))])
            .unwrap();
        transport.start().unwrap();
        transport
    }

    #[test]
    fn test_wav_transport_creates_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wav");

        let mut transport = started(&path, 16000, 1);
        transport.write(&pcm_frame(&[100, 200, 300, 400])).unwrap();
        transport.stop().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"WAVE");
        assert_eq!(&data[12..16], b"fmt ");
    }

    #[test]
    fn test_wav_transport_writes_samples_and_sizes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wav");

        let mut transport = started(&path, 16000, 1);
        transport.write(&pcm_frame(&[0x1234, 0x5678])).unwrap();
        transport.write(&pcm_frame(&[1, 2, 3, 4])).unwrap();
        transport.stop().unwrap();

        let data = std::fs::read(&path).unwrap();
        let header = WAV_HEADER_SIZE as usize;
        assert_eq!(&data[header..header + 4], &[0x34, 0x12, 0x78, 0x56]);

        let data_size = u32::from_le_bytes([data[40], data[41], data[42], data[43]]);
        assert_eq!(data_size, 12);
        let file_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        assert_eq!(file_size, WAV_HEADER_SIZE - 8 + 12);
    }

    #[test]
    fn test_wav_transport_stereo_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let mut transport = started(&path, 44100, 2);
        transport.stop().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(u16::from_le_bytes([data[22], data[23]]), 2);
        assert_eq!(
            u32::from_le_bytes([data[24], data[25], data[26], data[27]]),
            44100
        );
        assert_eq!(
            u32::from_le_bytes([data[28], data[29], data[30], data[31]]),
            44100 * 2 * 2
        );
        assert_eq!(u16::from_le_bytes([data[32], data[33]]), 4);
    }

    #[test]
    fn test_wav_transport_restart_opens_new_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("take.wav");

        let mut transport = started(&path, 16000, 1);
        transport.write(&pcm_frame(&[1, 2])).unwrap();
        transport.stop().unwrap();
        transport.start().unwrap();
        transport.write(&pcm_frame(&[3, 4, 5])).unwrap();
        transport.stop().unwrap();

        assert_eq!(
            transport.segments(),
            &[path.clone(), dir.path().join("take.1.wav")]
        );
        assert_eq!(std::fs::read(&path).unwrap().len(), 44 + 4);
        assert_eq!(
            std::fs::read(dir.path().join("take.1.wav")).unwrap().len(),
            44 + 6
        );
    }

    #[test]
    fn test_wav_transport_rejects_other_tracks() {
        let mut transport = WavTransport::new("/tmp/unused.wav");

        let aac = TrackFormat::Audio(AudioFormat::aac_broadcast());
        assert!(matches!(
            transport.configure(&[aac]),
            Err(StreamError::Configuration { .. })
        ));

        let video = TrackFormat::Video(VideoFormat {
            codec: VideoCodec::H264,
            width: 640,
            height: 480,
            frame_rate: 30,
            key_frame_interval: 2,
            bitrate: 1_000_000,
        });
        let pcm = TrackFormat::Audio(AudioFormat::pcm16(16000, 1));
        assert!(transport.configure(&[pcm, video]).is_err());
        assert!(transport.configure(&[]).is_err());
    }

    #[test]
    fn test_wav_transport_start_requires_configure() {
        let mut transport = WavTransport::new("/tmp/unused.wav");
        assert!(matches!(transport.start(), Err(TransportError::NotStarted)));
        assert!(matches!(
            transport.write(&pcm_frame(&[1])),
            Err(TransportError::NotStarted)
        ));
    }

    #[test]
    fn test_wav_transport_invalid_path_error() {
        let path = PathBuf::from("/nonexistent/directory/test.wav");
        let mut transport = WavTransport::new(&path);
        transport
            .configure(&[TrackFormat::Audio(AudioFormat::pcm16(16000, 1))])
            .unwrap();

        let err = transport.start().unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_wav_transport_flush_and_stop_without_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wav");

        let mut transport = WavTransport::new(&path);
        transport.flush().unwrap();
        transport.stop().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_wav_transport_name() {
        let transport = WavTransport::new("/path/to/audio.wav");
        assert_eq!(transport.name(), "wav:/path/to/audio.wav");
    }
}

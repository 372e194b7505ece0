//! Chunked reader over the capture ring buffer.

use std::time::Duration;

use ringbuf::traits::{Consumer, Observer};
use ringbuf::HeapCons;

/// Hands fixed-duration chunks of interleaved samples to the encoder.
///
/// The capture side pushes into the producer half at its own pace; reads
/// here never block and only ever return whole chunks.
pub struct AudioBuffer {
    consumer: HeapCons<i16>,
    /// Samples (not frames) per chunk, a multiple of the channel count.
    chunk_len: usize,
    /// Samples per second of audio, all channels together.
    samples_per_second: f64,
}

impl AudioBuffer {
    pub fn new(
        consumer: HeapCons<i16>,
        sample_rate: u32,
        channels: u16,
        chunk_duration: Duration,
    ) -> Self {
        let channels = usize::from(channels.max(1));
        let frames = (f64::from(sample_rate) * chunk_duration.as_secs_f64()) as usize;

        Self {
            consumer,
            chunk_len: frames.max(1) * channels,
            samples_per_second: f64::from(sample_rate) * channels as f64,
        }
    }

    /// Pops one chunk, or `None` if less than a chunk is buffered.
    pub fn try_read_chunk(&mut self) -> Option<Vec<i16>> {
        if self.consumer.occupied_len() < self.chunk_len {
            return None;
        }
        let mut chunk = vec![0i16; self.chunk_len];
        let read = self.consumer.pop_slice(&mut chunk);
        chunk.truncate(read);
        Some(chunk)
    }

    /// Samples per chunk.
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Audio waiting to be read.
    pub fn backlog(&self) -> Duration {
        Duration::from_secs_f64(self.consumer.occupied_len() as f64 / self.samples_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Producer, Split};
    use ringbuf::HeapRb;

    fn buffer(
        capacity: usize,
        rate: u32,
        channels: u16,
        chunk: Duration,
    ) -> (ringbuf::HeapProd<i16>, AudioBuffer) {
        let (producer, consumer) = HeapRb::<i16>::new(capacity).split();
        (producer, AudioBuffer::new(consumer, rate, channels, chunk))
    }

    #[test]
    fn test_reads_whole_chunks_in_order() {
        let (mut producer, mut reader) = buffer(16000, 16000, 1, Duration::from_millis(20));
        let samples: Vec<i16> = (0..700).collect();
        producer.push_slice(&samples);

        let first = reader.try_read_chunk().unwrap();
        let second = reader.try_read_chunk().unwrap();
        assert_eq!(first.len(), 320);
        assert_eq!(first[0], 0);
        assert_eq!(second[0], 320);

        // 60 samples left, less than a chunk
        assert!(reader.try_read_chunk().is_none());
    }

    #[test]
    fn test_chunk_len_counts_all_channels() {
        let (_, reader) = buffer(1, 44100, 2, Duration::from_millis(10));
        assert_eq!(reader.chunk_len(), 882);

        // Never smaller than one frame
        let (_, reader) = buffer(1, 8000, 2, Duration::from_micros(10));
        assert_eq!(reader.chunk_len(), 2);
    }

    #[test]
    fn test_backlog() {
        let (mut producer, mut reader) = buffer(48000, 16000, 2, Duration::from_millis(100));
        producer.push_slice(&[0i16; 16000]);

        assert_eq!(reader.backlog(), Duration::from_millis(500));
        reader.try_read_chunk().unwrap();
        assert!((reader.backlog().as_secs_f64() - 0.4).abs() < 1e-6);
    }
}

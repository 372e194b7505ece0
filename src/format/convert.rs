//! Sample format and channel layout conversion.
//!
//! All layouts are interleaved: frame `n` of a `c`-channel buffer occupies
//! `samples[n * c..(n + 1) * c]`.

/// Converts a normalized float sample to 16-bit PCM.
///
/// Scales by `i16::MAX` so `1.0` and `-1.0` map to symmetric values.
/// Out-of-range input saturates.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    // `as` saturates on overflow and maps NaN to 0
    (sample * f32::from(i16::MAX)) as i16
}

/// Averages every frame of a `channels`-wide buffer into one sample.
///
/// A trailing partial frame is ignored.
pub fn downmix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    let width = usize::from(channels.max(1));
    if width == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(width)
        .map(|frame| {
            let sum: i32 = frame.iter().copied().map(i32::from).sum();
            (sum / width as i32) as i16
        })
        .collect()
}

/// Copies every mono sample into all `channels` of an output frame.
pub fn upmix_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    let width = usize::from(channels.max(1));
    let mut out = Vec::with_capacity(samples.len() * width);
    for &sample in samples {
        out.extend(std::iter::repeat(sample).take(width));
    }
    out
}

/// Remaps a buffer from `from` channels to `to` channels.
///
/// Going to mono averages, going from mono duplicates, and any other
/// pairing goes through a mono mix.
pub fn remix(samples: &[i16], from: u16, to: u16) -> Vec<i16> {
    match (from, to) {
        (a, b) if a == b => samples.to_vec(),
        (_, 1) => downmix_to_mono(samples, from),
        (1, _) => upmix_mono(samples, to),
        _ => upmix_mono(&downmix_to_mono(samples, from), to),
    }
}

/// Encodes samples as little-endian 16-bit PCM bytes.
pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

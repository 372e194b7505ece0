//! Sample rate conversion by linear interpolation.
//!
//! Good enough for speech and broadcast monitoring. Encoders that need
//! studio quality should resample before handing samples to the pipeline.

/// Resamples an interleaved buffer of `channels` channels.
///
/// Output frame `i` sits at input position `i * from_rate / to_rate` and is
/// interpolated between its two neighbouring input frames. Positions past
/// the last input frame repeat it. A trailing partial frame is ignored.
///
/// Each call starts at position zero and rounds its output length up, so a
/// stream fed in chunks whose length is not a whole multiple of the rate
/// ratio drifts slightly long and has small seams at chunk edges. 20 ms
/// chunks between 16, 44.1 and 48 kHz divide evenly and are unaffected.
pub fn resample(samples: &[i16], channels: u16, from_rate: u32, to_rate: u32) -> Vec<i16> {
    let width = usize::from(channels.max(1));
    let frames = samples.len() / width;
    if from_rate == to_rate || frames == 0 || to_rate == 0 {
        return samples[..frames * width].to_vec();
    }

    let step = f64::from(from_rate) / f64::from(to_rate);
    let out_frames = (frames as f64 / step).ceil() as usize;
    let last = frames - 1;

    let mut out = Vec::with_capacity(out_frames * width);
    for i in 0..out_frames {
        let position = i as f64 * step;
        let index = (position as usize).min(last);
        let next = (index + 1).min(last);
        let weight = (position - index as f64).clamp(0.0, 1.0);

        let current = &samples[index * width..(index + 1) * width];
        let following = &samples[next * width..(next + 1) * width];
        out.extend(current.iter().zip(following).map(|(&a, &b)| {
            let a = f64::from(a);
            (a + (f64::from(b) - a) * weight) as i16
        }));
    }
    out
}

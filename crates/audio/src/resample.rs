use std::borrow::Cow;

/// Resample audio using linear interpolation.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Cow<'_, [f32]> {
    if from_rate == to_rate {
        return Cow::Borrowed(samples);
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut output = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx.fract() as f32;
        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }
    Cow::Owned(output)
}

/// Average interleaved i16 frames down to one f32 channel in [-1.0, 1.0].
pub fn downmix_to_f32(raw: &[i16], channels: usize) -> Vec<f32> {
    let channels = channels.max(1);
    let mut mono = Vec::with_capacity(raw.len() / channels);
    for frame in raw.chunks(channels) {
        let sum: i32 = frame.iter().map(|s| *s as i32).sum();
        let avg = sum as f32 / channels as f32;
        mono.push(avg / i16::MAX as f32);
    }
    mono
}

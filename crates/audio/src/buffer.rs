use crate::resample::resample_linear;

/// Mono audio held in memory as f32 samples in [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Minimal valid waveform: a single silent sample.
    pub fn silent(sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0],
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples covering `[start, end)` seconds, clamped to the buffer bounds.
    /// Sample indices are truncated the same way on both edges so adjacent
    /// slices never share a sample.
    pub fn slice_secs(&self, start: f64, end: f64) -> &[f32] {
        let rate = self.sample_rate as f64;
        let lo = ((start * rate) as usize).min(self.samples.len());
        let hi = ((end * rate) as usize).min(self.samples.len());
        if lo >= hi {
            return &[];
        }
        &self.samples[lo..hi]
    }

    /// Copy of this buffer at `target_rate`, resampled if the rates differ.
    pub fn to_rate(&self, target_rate: u32) -> AudioBuffer {
        AudioBuffer {
            samples: resample_linear(&self.samples, self.sample_rate, target_rate).into_owned(),
            sample_rate: target_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_secs_bounds() {
        let buffer = AudioBuffer::new(vec![0.1; 16000], 16000);

        assert_eq!(buffer.slice_secs(0.0, 0.5).len(), 8000);
        assert_eq!(buffer.slice_secs(0.5, 2.0).len(), 8000);
        assert_eq!(buffer.slice_secs(2.0, 3.0).len(), 0);
        assert_eq!(buffer.slice_secs(0.5, 0.5).len(), 0);
    }

    #[test]
    fn test_adjacent_slices_do_not_share_samples() {
        let buffer = AudioBuffer::new(vec![0.0; 16000], 16000);

        let first = buffer.slice_secs(0.0, 0.25);
        let second = buffer.slice_secs(0.25, 0.5);
        assert_eq!(first.len() + second.len(), buffer.slice_secs(0.0, 0.5).len());
    }

    #[test]
    fn test_silent_is_single_sample() {
        let silent = AudioBuffer::silent(16000);
        assert_eq!(silent.len(), 1);
        assert_eq!(silent.samples[0], 0.0);
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 8000], 16000);
        assert!((buffer.duration_secs() - 0.5).abs() < 1e-9);
    }
}

//! Kaldi-style log-mel filterbank features for the speaker embedding model.
//!
//! Matches the front end wespeaker models are trained with: 25 ms frames at
//! a 10 ms shift, povey window, 80 HTK mel bins, natural log, then per-bin
//! mean subtraction over the utterance.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::{Arc, OnceLock};

const SAMPLE_RATE: usize = 16_000;
const FRAME_LEN: usize = 400; // 25 ms
const FRAME_SHIFT: usize = 160; // 10 ms
const N_FFT: usize = 512;
const N_FREQ: usize = (N_FFT / 2) + 1; // 257
const PREEMPHASIS: f64 = 0.97;
const LOW_FREQ: f64 = 20.0;
const HIGH_FREQ: f64 = 8_000.0;

/// Mel bins per frame in the model input.
pub const N_MELS: usize = 80;

/// Cached precomputed values for feature extraction.
struct CachedFbankData {
    povey_window: Vec<f64>,
    mel_filters: Vec<Vec<f64>>,
    fft: Arc<dyn Fft<f64>>,
}

static CACHED_DATA: OnceLock<CachedFbankData> = OnceLock::new();

fn get_cached_data() -> &'static CachedFbankData {
    CACHED_DATA.get_or_init(|| {
        let mut planner = FftPlanner::<f64>::new();
        CachedFbankData {
            povey_window: povey_window(FRAME_LEN),
            mel_filters: mel_filter_bank_htk(N_FREQ, N_MELS, LOW_FREQ, HIGH_FREQ),
            fft: planner.plan_fft_forward(N_FFT),
        }
    })
}

/// Number of full analysis frames for a given sample count.
pub fn frame_count(samples: usize) -> usize {
    if samples < FRAME_LEN {
        return 0;
    }
    1 + (samples - FRAME_LEN) / FRAME_SHIFT
}

/// Compute mean-normalized fbank features from 16 kHz mono audio.
///
/// Frames are flattened row-major into `frame_count(len) * N_MELS` values.
/// Input shorter than one frame yields an empty vector.
pub fn compute_fbank(audio_16k_mono: &[f32]) -> Vec<f32> {
    let n_frames = frame_count(audio_16k_mono.len());
    if n_frames == 0 {
        return Vec::new();
    }

    let cached = get_cached_data();
    let window = &cached.povey_window;
    let mel_filters = &cached.mel_filters;
    let fft = &cached.fft;

    let mut features = vec![0.0f32; n_frames * N_MELS];
    let mut frame = vec![0.0f64; FRAME_LEN];
    let mut frame_in: Vec<Complex<f64>> = vec![Complex { re: 0.0, im: 0.0 }; N_FFT];

    for frame_idx in 0..n_frames {
        let start = frame_idx * FRAME_SHIFT;
        for (dst, src) in frame
            .iter_mut()
            .zip(&audio_16k_mono[start..start + FRAME_LEN])
        {
            *dst = *src as f64;
        }

        remove_dc_offset(&mut frame);
        preemphasize(&mut frame);

        for (out, (sample, win)) in frame_in.iter_mut().zip(frame.iter().zip(window.iter())) {
            out.re = sample * win;
            out.im = 0.0;
        }
        // The buffer is reused and holds the previous transform past the
        // windowed frame.
        for out in frame_in.iter_mut().skip(FRAME_LEN) {
            out.re = 0.0;
            out.im = 0.0;
        }

        fft.process(&mut frame_in);

        let mut power = [0.0f64; N_FREQ];
        for (p, c) in power.iter_mut().zip(frame_in.iter().take(N_FREQ)) {
            *p = c.re * c.re + c.im * c.im;
        }

        for m in 0..N_MELS {
            let mut v = 0.0f64;
            for k in 0..N_FREQ {
                v += mel_filters[k][m] * power[k];
            }
            features[frame_idx * N_MELS + m] = v.max(1e-10).ln() as f32;
        }
    }

    subtract_per_bin_mean(&mut features, n_frames);
    features
}

fn remove_dc_offset(frame: &mut [f64]) {
    let mean = frame.iter().sum::<f64>() / frame.len() as f64;
    for v in frame.iter_mut() {
        *v -= mean;
    }
}

fn preemphasize(frame: &mut [f64]) {
    for i in (1..frame.len()).rev() {
        frame[i] -= PREEMPHASIS * frame[i - 1];
    }
    frame[0] -= PREEMPHASIS * frame[0];
}

fn subtract_per_bin_mean(features: &mut [f32], n_frames: usize) {
    for m in 0..N_MELS {
        let mean = (0..n_frames)
            .map(|t| features[t * N_MELS + m] as f64)
            .sum::<f64>()
            / n_frames as f64;
        for t in 0..n_frames {
            features[t * N_MELS + m] -= mean as f32;
        }
    }
}

fn povey_window(n: usize) -> Vec<f64> {
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let hann = 0.5 - 0.5 * ((2.0 * std::f64::consts::PI * i as f64) / denom).cos();
            hann.powf(0.85)
        })
        .collect()
}

fn hertz_to_mel_htk(freq: f64) -> f64 {
    1127.0 * (1.0 + freq / 700.0).ln()
}

/// Triangular filters spaced evenly in HTK mel scale, no area normalization.
fn mel_filter_bank_htk(
    num_frequency_bins: usize,
    num_mel_filters: usize,
    min_frequency: f64,
    max_frequency: f64,
) -> Vec<Vec<f64>> {
    let mel_min = hertz_to_mel_htk(min_frequency);
    let mel_max = hertz_to_mel_htk(max_frequency);
    let mel_delta = (mel_max - mel_min) / (num_mel_filters + 1) as f64;
    let hz_per_bin = SAMPLE_RATE as f64 / N_FFT as f64;

    let mut mel_filters = vec![vec![0.0f64; num_mel_filters]; num_frequency_bins];
    for f in 0..num_frequency_bins {
        let mel = hertz_to_mel_htk(f as f64 * hz_per_bin);
        for m in 0..num_mel_filters {
            let left = mel_min + m as f64 * mel_delta;
            let center = left + mel_delta;
            let right = center + mel_delta;
            let up = (mel - left) / (center - left);
            let down = (right - mel) / (right - center);
            mel_filters[f][m] = up.min(down).max(0.0);
        }
    }
    mel_filters
}

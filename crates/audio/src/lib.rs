mod buffer;
mod resample;
mod wav;

pub use buffer::AudioBuffer;
pub use resample::{downmix_to_f32, resample_linear};
pub use wav::{read_wav_mono, read_wav_mono_at, write_wav_mono};

/// Canonical sample rate for identification, combination and transcription.
pub const CANONICAL_SAMPLE_RATE: u32 = 16000;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("failed to read wav: {0}")]
    Read(String),
    #[error("failed to write wav: {0}")]
    Write(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

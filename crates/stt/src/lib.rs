mod engine;

pub use engine::Transcriber;

#[derive(Debug, thiserror::Error)]
pub enum SttError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("audio load failed: {0}")]
    AudioLoad(#[from] orate_audio::AudioError),
}

pub type Result<T> = std::result::Result<T, SttError>;

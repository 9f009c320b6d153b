mod whisper;

pub use whisper::SherpaWhisperEngine;

#[derive(Debug, thiserror::Error)]
pub enum SherpaError {
    #[error("model files not found: {0}")]
    MissingFiles(String),
    #[error("load failed: {0}")]
    LoadFailed(String),
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
}

pub type Result<T> = std::result::Result<T, SherpaError>;

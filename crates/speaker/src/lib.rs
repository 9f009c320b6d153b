mod embedding;
mod encoder;
mod identify;

pub use embedding::Embedding;
pub use encoder::{SpeakerEncoder, TimedEncoder};
pub use identify::{identify_target, IdentifyConfig, TargetSpeaker};

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SpeakerError {
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),
    #[error("embedding timed out after {0:?}")]
    Timeout(Duration),
    #[error("embedding worker unavailable")]
    WorkerUnavailable,
}

pub type Result<T> = std::result::Result<T, SpeakerError>;

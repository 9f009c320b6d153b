mod combine;
mod extract;

pub use combine::combine_segments;
pub use extract::{extract_target, Extraction, ExtractionConfig};

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("identification failed: {0}")]
    Identification(#[from] orate_speaker::SpeakerError),
    #[error("overlap resolution failed: {0}")]
    Resolution(#[from] orate_separation::SeparationError),
    #[error("audio io failed: {0}")]
    Audio(#[from] orate_audio::AudioError),
}

pub type Result<T> = std::result::Result<T, ExtractionError>;

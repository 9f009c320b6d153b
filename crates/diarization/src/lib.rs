mod interval;
mod turns;

pub use interval::TimeInterval;
pub use turns::{classify_turns, MonoTurn, OverlapTurn, SpeakerLabel, SpeakerTurn, TurnSet};

#[derive(Debug, thiserror::Error)]
pub enum DiarizationError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("processing error: {0}")]
    ProcessingError(String),
}

pub type Result<T> = std::result::Result<T, DiarizationError>;

/// Splits a recording into speaker turns. Turns carry the full set of
/// speakers the model heard in that span; see [`classify_turns`] for the
/// mono/overlap split.
pub trait Diarizer: Send + Sync {
    fn diarize(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<SpeakerTurn>>;
}

//! Local ONNX models for diarization and speaker embeddings.
//!
//! Two models drive this crate: the pyannote segmentation-3.0 network for
//! frame-level speaker activity and a wespeaker embedding network for
//! voiceprints. Both run on CPU through `ort`.

mod cluster;
mod encoder;
mod fbank;
mod segmentation;

pub use encoder::WespeakerEncoder;
pub use segmentation::{DiarizeConfig, PyannoteDiarizer};

use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

#[derive(Debug, thiserror::Error)]
pub enum PyannoteError {
    #[error("failed to load model: {0}")]
    Model(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("audio too short to embed: {0} samples")]
    AudioTooShort(usize),
}

pub type Result<T> = std::result::Result<T, PyannoteError>;

pub(crate) fn build_session(model_path: &Path) -> Result<Session> {
    if !model_path.is_file() {
        return Err(PyannoteError::Model(format!(
            "model file not found: {}",
            model_path.display()
        )));
    }
    Session::builder()
        .map_err(|e| PyannoteError::Model(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| PyannoteError::Model(e.to_string()))?
        .with_intra_threads(1)
        .map_err(|e| PyannoteError::Model(e.to_string()))?
        .with_inter_threads(1)
        .map_err(|e| PyannoteError::Model(e.to_string()))?
        .commit_from_file(model_path)
        .map_err(|e| PyannoteError::Model(e.to_string()))
}

//! Two-stream source separation on a local sepformer ONNX model.

mod model;

pub use model::SepformerSeparator;

#[derive(Debug, thiserror::Error)]
pub enum SepformerError {
    #[error("failed to load model: {0}")]
    Model(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, SepformerError>;

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;

use orate_audio::{resample_linear, CANONICAL_SAMPLE_RATE};
use orate_speaker::{Embedding, SpeakerEncoder, SpeakerError};

use crate::fbank::{compute_fbank, N_MELS};
use crate::{build_session, PyannoteError, Result};

/// Speaker embedding model in the wespeaker ONNX export layout: fbank
/// features in, one embedding row out.
#[derive(Debug)]
pub struct WespeakerEncoder {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl WespeakerEncoder {
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self> {
        let session = build_session(model_path.as_ref())?;

        let input_name = session
            .inputs
            .iter()
            .find(|i| i.name == "feats")
            .map(|i| i.name.clone())
            .or_else(|| session.inputs.first().map(|i| i.name.clone()))
            .ok_or_else(|| PyannoteError::Model("embedding model has no inputs".to_string()))?;

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name == "embs")
            .map(|o| o.name.clone())
            .or_else(|| session.outputs.first().map(|o| o.name.clone()))
            .ok_or_else(|| PyannoteError::Model("embedding model has no outputs".to_string()))?;

        tracing::info!(
            model = %model_path.as_ref().display(),
            "loaded speaker embedding model"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    pub fn compute(&self, samples: &[f32], sample_rate: u32) -> Result<Embedding> {
        let audio = resample_linear(samples, sample_rate, CANONICAL_SAMPLE_RATE);
        let features = compute_fbank(&audio);
        let n_frames = features.len() / N_MELS;
        if n_frames == 0 {
            return Err(PyannoteError::AudioTooShort(audio.len()));
        }

        let input = Tensor::from_array(([1i64, n_frames as i64, N_MELS as i64], features))
            .map_err(|e| PyannoteError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PyannoteError::Inference("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| PyannoteError::Inference(e.to_string()))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| PyannoteError::Inference("missing embedding output".to_string()))?;

        let (_shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PyannoteError::Inference(e.to_string()))?;
        if data.is_empty() {
            return Err(PyannoteError::Inference("empty embedding output".to_string()));
        }

        Ok(Embedding::new(data.to_vec()))
    }
}

impl SpeakerEncoder for WespeakerEncoder {
    fn embed(&self, samples: &[f32], sample_rate: u32) -> orate_speaker::Result<Embedding> {
        self.compute(samples, sample_rate)
            .map_err(|e| SpeakerError::EmbeddingFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file_is_error() {
        let result = WespeakerEncoder::load("/nonexistent/wespeaker.onnx");
        assert!(matches!(result, Err(PyannoteError::Model(_))));
    }
}

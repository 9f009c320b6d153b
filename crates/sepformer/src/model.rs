use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use orate_audio::resample_linear;
use orate_separation::{SeparationError, SourceSeparator};

use crate::{Result, SepformerError};

/// Sepformer separates at 8 kHz regardless of the input rate.
const NATIVE_SAMPLE_RATE: u32 = 8_000;

/// Sepformer speech separation in the SpeechBrain ONNX export layout:
/// mixture waveform in, `[1, time, 2]` estimated sources out.
#[derive(Debug)]
pub struct SepformerSeparator {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl SepformerSeparator {
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.is_file() {
            return Err(SepformerError::Model(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| SepformerError::Model(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| SepformerError::Model(e.to_string()))?
            .with_intra_threads(1)
            .map_err(|e| SepformerError::Model(e.to_string()))?
            .with_inter_threads(1)
            .map_err(|e| SepformerError::Model(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| SepformerError::Model(e.to_string()))?;

        let input_name = session
            .inputs
            .iter()
            .find(|i| i.name == "mix")
            .map(|i| i.name.clone())
            .or_else(|| session.inputs.first().map(|i| i.name.clone()))
            .ok_or_else(|| SepformerError::Model("separation model has no inputs".to_string()))?;

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name == "est_sources")
            .map(|o| o.name.clone())
            .or_else(|| session.outputs.first().map(|o| o.name.clone()))
            .ok_or_else(|| SepformerError::Model("separation model has no outputs".to_string()))?;

        tracing::info!(model = %model_path.display(), "loaded separation model");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    pub fn separate_mixture(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<(Vec<f32>, Vec<f32>)> {
        let mix = resample_linear(samples, sample_rate, NATIVE_SAMPLE_RATE);
        if mix.is_empty() {
            return Err(SepformerError::Inference("empty mixture".to_string()));
        }

        let started = Instant::now();
        let input = Tensor::from_array(([1i64, mix.len() as i64], mix.to_vec()))
            .map_err(|e| SepformerError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| SepformerError::Inference("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| SepformerError::Inference(e.to_string()))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| SepformerError::Inference("missing separation output".to_string()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| SepformerError::Inference(e.to_string()))?;

        let sources = shape.as_ref().last().copied().unwrap_or(0) as usize;
        if sources < 2 || data.is_empty() {
            return Err(SepformerError::Inference(format!(
                "expected two estimated sources, model produced {sources}"
            )));
        }

        let (first, second) = deinterleave_two(data, sources);
        tracing::debug!(
            input_samples = mix.len(),
            output_samples = first.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "separated mixture"
        );
        Ok((first, second))
    }
}

impl SourceSeparator for SepformerSeparator {
    fn separate(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> orate_separation::Result<(Vec<f32>, Vec<f32>)> {
        self.separate_mixture(samples, sample_rate)
            .map_err(|e| SeparationError::SeparationFailed(e.to_string()))
    }

    fn output_sample_rate(&self) -> u32 {
        NATIVE_SAMPLE_RATE
    }
}

/// Split a `[time, sources]` row-major buffer into its first two columns.
fn deinterleave_two(data: &[f32], sources: usize) -> (Vec<f32>, Vec<f32>) {
    let frames = data.len() / sources;
    let mut first = Vec::with_capacity(frames);
    let mut second = Vec::with_capacity(frames);
    for frame in data.chunks_exact(sources) {
        first.push(frame[0]);
        second.push(frame[1]);
    }
    (first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleave_two_columns() {
        let data = [1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let (first, second) = deinterleave_two(&data, 2);
        assert_eq!(first, vec![1.0, 2.0, 3.0]);
        assert_eq!(second, vec![-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_deinterleave_ignores_extra_sources() {
        let data = [1.0, -1.0, 9.0, 2.0, -2.0, 9.0];
        let (first, second) = deinterleave_two(&data, 3);
        assert_eq!(first, vec![1.0, 2.0]);
        assert_eq!(second, vec![-1.0, -2.0]);
    }

    #[test]
    fn test_missing_model_file_is_error() {
        let result = SepformerSeparator::load("/nonexistent/sepformer.onnx");
        assert!(matches!(result, Err(SepformerError::Model(_))));
    }
}

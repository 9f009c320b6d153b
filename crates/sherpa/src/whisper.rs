//! Whisper ONNX offline transcription engine.
//!
//! Uses sherpa-onnx's offline Whisper API for non-streaming transcription.

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use orate_audio::AudioBuffer;
use orate_stt::Transcriber;
use sherpa_rs::whisper::{WhisperConfig, WhisperRecognizer};

use crate::{Result, SherpaError};

/// Batch Whisper engine for the reconstructed target audio.
///
/// The model directory should contain:
/// - `{prefix}-encoder.onnx` or `{prefix}-encoder.int8.onnx`
/// - `{prefix}-decoder.onnx` or `{prefix}-decoder.int8.onnx`
/// - `{prefix}-tokens.txt`
///
/// Where prefix is typically "tiny", "base", "small", "medium" or "large".
pub struct SherpaWhisperEngine {
    recognizer: Mutex<WhisperRecognizer>,
    model_name: String,
}

impl SherpaWhisperEngine {
    /// Create a new Whisper engine from model files.
    ///
    /// `language` is a code like "en" or "ru", or empty for auto-detect.
    pub fn new(model_dir: impl AsRef<Path>, language: &str) -> Result<Self> {
        Self::new_with_prefix(model_dir, language, None)
    }

    /// Create a new Whisper engine with an explicit model prefix.
    /// With `None` the prefix is detected from the files present.
    pub fn new_with_prefix(
        model_dir: impl AsRef<Path>,
        language: &str,
        prefix: Option<&str>,
    ) -> Result<Self> {
        let model_dir = model_dir.as_ref();

        let prefix = match prefix {
            Some(p) => p.to_string(),
            None => detect_model_prefix(model_dir)?,
        };

        let encoder = find_model_file(model_dir, &prefix, "encoder")?;
        let decoder = find_model_file(model_dir, &prefix, "decoder")?;
        let tokens = model_dir.join(format!("{prefix}-tokens.txt"));

        if !tokens.exists() {
            return Err(SherpaError::MissingFiles(format!(
                "tokens file not found: {}",
                tokens.display()
            )));
        }

        tracing::info!(
            encoder = %encoder.display(),
            decoder = %decoder.display(),
            tokens = %tokens.display(),
            language = language,
            "Loading Whisper ONNX model"
        );

        let config = WhisperConfig {
            encoder: encoder.to_string_lossy().to_string(),
            decoder: decoder.to_string_lossy().to_string(),
            tokens: tokens.to_string_lossy().to_string(),
            language: language.to_string(),
            num_threads: Some(2),
            ..Default::default()
        };

        let recognizer = WhisperRecognizer::new(config).map_err(|e| {
            tracing::error!(error = %e, "Failed to create Whisper recognizer");
            SherpaError::LoadFailed(e.to_string())
        })?;

        let model_name = model_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("whisper")
            .to_string();

        Ok(Self {
            recognizer: Mutex::new(recognizer),
            model_name,
        })
    }

    /// Transcribe audio samples.
    pub fn transcribe_samples(&self, audio: &[f32], sample_rate: u32) -> Result<String> {
        let mut recognizer = self
            .recognizer
            .lock()
            .map_err(|_| SherpaError::TranscriptionFailed("lock poisoned".to_string()))?;

        let started = Instant::now();
        let result = recognizer.transcribe(sample_rate, audio);
        tracing::debug!(
            audio_secs = audio.len() as f64 / sample_rate as f64,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Whisper inference complete"
        );
        Ok(result.text.trim().to_string())
    }
}

impl Transcriber for SherpaWhisperEngine {
    fn transcribe(&self, audio: &AudioBuffer) -> orate_stt::Result<String> {
        self.transcribe_samples(&audio.samples, audio.sample_rate)
            .map_err(|e| orate_stt::SttError::TranscriptionFailed(e.to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Detect the model prefix from available files in the directory.
fn detect_model_prefix(model_dir: &Path) -> Result<String> {
    let prefixes = [
        "tiny",
        "base",
        "small",
        "medium",
        "large",
        "turbo",
        "distil-small",
        "distil-medium",
        "distil-large-v2",
        "distil-large-v3",
    ];

    for prefix in prefixes {
        let encoder = model_dir.join(format!("{prefix}-encoder.onnx"));
        let encoder_int8 = model_dir.join(format!("{prefix}-encoder.int8.onnx"));
        if encoder.exists() || encoder_int8.exists() {
            return Ok(prefix.to_string());
        }
    }

    Err(SherpaError::MissingFiles(
        "Could not detect Whisper model prefix (expected tiny/base/small/medium/large encoder.onnx)"
            .to_string(),
    ))
}

/// Find the model file, preferring the int8 quantized version.
fn find_model_file(model_dir: &Path, prefix: &str, component: &str) -> Result<std::path::PathBuf> {
    let int8_path = model_dir.join(format!("{prefix}-{component}.int8.onnx"));
    if int8_path.exists() {
        return Ok(int8_path);
    }

    let fp32_path = model_dir.join(format!("{prefix}-{component}.onnx"));
    if fp32_path.exists() {
        return Ok(fp32_path);
    }

    Err(SherpaError::MissingFiles(format!(
        "{} not found in {} (tried {}-{}.int8.onnx and {}-{}.onnx)",
        component,
        model_dir.display(),
        prefix,
        component,
        prefix,
        component
    )))
}

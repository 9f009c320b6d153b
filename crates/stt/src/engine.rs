use std::path::Path;

use orate_audio::{read_wav_mono_at, AudioBuffer, CANONICAL_SAMPLE_RATE};

pub trait Transcriber: Send + Sync {
    /// Transcribe mono audio at the canonical rate.
    fn transcribe(&self, audio: &AudioBuffer) -> crate::Result<String>;

    /// Transcribe an audio file directly.
    ///
    /// Default implementation reads the WAV file at the canonical rate and
    /// calls `transcribe()`. Engines with native file support can override.
    fn transcribe_file(&self, path: &Path) -> crate::Result<String> {
        let audio = read_wav_mono_at(path, CANONICAL_SAMPLE_RATE)?;
        tracing::debug!(
            path = %path.display(),
            duration_secs = audio.duration_secs(),
            "transcribing file"
        );
        self.transcribe(&audio)
    }

    fn model_name(&self) -> &str;
}

use std::path::Path;

use crate::resample::downmix_to_f32;
use crate::{AudioBuffer, AudioError, Result};

/// Read a WAV file as mono f32 at the file's native sample rate.
/// Multi-channel audio is downmixed by channel averaging.
pub fn read_wav_mono(path: &Path) -> Result<AudioBuffer> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| AudioError::Read(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let raw: Vec<i16> = reader
        .samples::<i16>()
        .map(|s| s.map_err(|e| AudioError::Read(format!("{}: {e}", path.display()))))
        .collect::<Result<_>>()?;

    Ok(AudioBuffer::new(
        downmix_to_f32(&raw, channels),
        spec.sample_rate,
    ))
}

/// Read a WAV file as mono f32, resampled to `target_rate`.
pub fn read_wav_mono_at(path: &Path, target_rate: u32) -> Result<AudioBuffer> {
    let buffer = read_wav_mono(path)?;
    Ok(buffer.to_rate(target_rate))
}

/// Write mono f32 samples as 16-bit PCM.
pub fn write_wav_mono(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| AudioError::Write(format!("{}: {e}", path.display())))?;
    for &sample in &buffer.samples {
        let clamped = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(clamped)
            .map_err(|e| AudioError::Write(format!("{}: {e}", path.display())))?;
    }
    writer
        .finalize()
        .map_err(|e| AudioError::Write(format!("{}: {e}", path.display())))?;

    tracing::debug!(
        path = %path.display(),
        samples = buffer.samples.len(),
        sample_rate = buffer.sample_rate,
        "wrote wav"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_wav_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let original = AudioBuffer::new(vec![0.0, 0.25, -0.25, 0.5, -0.5], 16000);
        write_wav_mono(&path, &original).unwrap();

        let loaded = read_wav_mono(&path).unwrap();
        assert_eq!(loaded.sample_rate, 16000);
        assert_eq!(loaded.len(), original.len());
        for (a, b) in loaded.samples.iter().zip(original.samples.iter()) {
            assert!((a - b).abs() < 1.0 / 1000.0);
        }
    }

    #[test]
    fn test_read_resamples_to_target_rate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("slow.wav");

        write_wav_mono(&path, &AudioBuffer::new(vec![0.1; 8000], 8000)).unwrap();

        let loaded = read_wav_mono_at(&path, 16000).unwrap();
        assert_eq!(loaded.sample_rate, 16000);
        assert_eq!(loaded.len(), 16000);
    }

    #[test]
    fn test_silent_artifact_is_decodable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("silent.wav");

        write_wav_mono(&path, &AudioBuffer::silent(16000)).unwrap();

        let loaded = read_wav_mono(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.samples[0], 0.0);
    }

    #[test]
    fn test_read_missing_file_is_error() {
        let result = read_wav_mono(Path::new("/nonexistent/audio.wav"));
        assert!(matches!(result, Err(AudioError::Read(_))));
    }
}

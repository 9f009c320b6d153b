use std::path::{Path, PathBuf};

use orate_audio::{write_wav_mono, AudioBuffer};
use orate_diarization::TurnSet;
use orate_separation::{resolve_overlaps, ResolveConfig, SourceSeparator};
use orate_speaker::{identify_target, IdentifyConfig, SpeakerEncoder, TargetSpeaker};

use crate::{combine_segments, Result};

#[derive(Debug, Clone, Default)]
pub struct ExtractionConfig {
    pub identify: IdentifyConfig,
    pub resolve: ResolveConfig,
}

/// Outcome of a target-speaker extraction run.
#[derive(Debug)]
pub struct Extraction {
    pub path: PathBuf,
    pub target: TargetSpeaker,
    pub duration_secs: f64,
}

/// Run identification, overlap resolution and combination in sequence and
/// persist the reconstructed waveform at `output_path`.
///
/// An unidentified target is not an error: the run still writes a minimal
/// silent artifact so downstream stages always get decodable audio.
pub fn extract_target(
    mixed: &AudioBuffer,
    reference: &AudioBuffer,
    turns: &TurnSet,
    encoder: &dyn SpeakerEncoder,
    separator: &dyn SourceSeparator,
    config: &ExtractionConfig,
    output_path: &Path,
) -> Result<Extraction> {
    let target = identify_target(mixed, reference, &turns.mono, encoder, &config.identify)?;

    let combined = match &target {
        TargetSpeaker::Found {
            label, embedding, ..
        } => {
            let overlap_segments = resolve_overlaps(
                mixed,
                &turns.overlap,
                label,
                embedding,
                separator,
                encoder,
                &config.resolve,
            )?;
            combine_segments(mixed, label, &turns.mono, &overlap_segments)
        }
        TargetSpeaker::NotFound => {
            tracing::warn!("target speaker not found, writing silent waveform");
            AudioBuffer::silent(mixed.sample_rate)
        }
    };

    write_wav_mono(output_path, &combined)?;
    tracing::info!(
        path = %output_path.display(),
        duration_secs = combined.duration_secs(),
        "wrote extracted target audio"
    );

    Ok(Extraction {
        path: output_path.to_path_buf(),
        target,
        duration_secs: combined.duration_secs(),
    })
}

use std::collections::BTreeMap;

use orate_audio::AudioBuffer;
use orate_diarization::{MonoTurn, SpeakerLabel};

use crate::{Embedding, Result, SpeakerEncoder};

/// Outcome of target-speaker identification. Resolved once per run and read
/// only downstream.
#[derive(Debug, Clone)]
pub enum TargetSpeaker {
    Found {
        label: SpeakerLabel,
        /// Reference-clip embedding, reused for stream selection downstream.
        embedding: Embedding,
        similarity: f32,
    },
    NotFound,
}

impl TargetSpeaker {
    pub fn is_found(&self) -> bool {
        matches!(self, TargetSpeaker::Found { .. })
    }
}

#[derive(Debug, Clone)]
pub struct IdentifyConfig {
    /// Mono turns shorter than this are too noisy to embed reliably.
    pub min_turn_duration: f64,
    /// Minimum mean-embedding similarity for a positive identification.
    pub identify_threshold: f32,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            min_turn_duration: 1.0,
            identify_threshold: 0.75,
        }
    }
}

/// Match the reference clip against mono turns of the mixed recording.
///
/// Per-turn embedding failures are logged and skipped; only the reference
/// embedding itself is allowed to fail the call. Ties on maximum similarity
/// resolve to the lexicographically smallest label.
pub fn identify_target(
    mixed: &AudioBuffer,
    reference: &AudioBuffer,
    mono_turns: &[MonoTurn],
    encoder: &dyn SpeakerEncoder,
    config: &IdentifyConfig,
) -> Result<TargetSpeaker> {
    let reference_embedding = encoder.embed(&reference.samples, reference.sample_rate)?;

    let mut by_speaker: BTreeMap<SpeakerLabel, Vec<Embedding>> = BTreeMap::new();
    for turn in mono_turns {
        if turn.interval.duration() < config.min_turn_duration {
            tracing::debug!(
                speaker = %turn.speaker,
                start = turn.interval.start,
                end = turn.interval.end,
                "mono turn below minimum duration, skipping"
            );
            continue;
        }
        let slice = mixed.slice_secs(turn.interval.start, turn.interval.end);
        match encoder.embed(slice, mixed.sample_rate) {
            Ok(embedding) => by_speaker
                .entry(turn.speaker.clone())
                .or_default()
                .push(embedding),
            Err(e) => tracing::warn!(
                speaker = %turn.speaker,
                start = turn.interval.start,
                end = turn.interval.end,
                error = %e,
                "embedding failed for mono turn, skipping"
            ),
        }
    }

    if by_speaker.is_empty() {
        tracing::info!("no mono turn produced a usable embedding");
        return Ok(TargetSpeaker::NotFound);
    }

    let mut best: Option<(&SpeakerLabel, f32)> = None;
    for (label, embeddings) in &by_speaker {
        let Some(mean) = Embedding::mean_of(embeddings) else {
            continue;
        };
        let similarity = mean.cosine_similarity(&reference_embedding);
        tracing::debug!(
            speaker = %label,
            similarity,
            turns = embeddings.len(),
            "mean similarity against reference"
        );
        match best {
            // Strict comparison keeps the first maximum, which in map order
            // is the lexicographically smallest label.
            Some((_, best_sim)) if similarity <= best_sim => {}
            _ => best = Some((label, similarity)),
        }
    }

    let Some((label, similarity)) = best else {
        return Ok(TargetSpeaker::NotFound);
    };

    if similarity < config.identify_threshold {
        tracing::info!(
            best_speaker = %label,
            similarity,
            threshold = config.identify_threshold,
            "no speaker passed the identification threshold"
        );
        return Ok(TargetSpeaker::NotFound);
    }

    tracing::info!(speaker = %label, similarity, "identified target speaker");
    Ok(TargetSpeaker::Found {
        label: label.clone(),
        embedding: reference_embedding,
        similarity,
    })
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crossbeam_channel::unbounded;
use orate_audio::AudioBuffer;
use orate_diarization::{OverlapTurn, SpeakerLabel, TimeInterval};
use orate_speaker::{Embedding, SpeakerEncoder};

use crate::{Result, SeparationError, SourceSeparator};

/// A separated stream attributed to the target speaker, still at the
/// separator's native rate, plus its position in the original recording.
#[derive(Debug, Clone)]
pub struct ResolvedSegment {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub interval: TimeInterval,
}

#[derive(Debug, Clone)]
pub struct ResolveConfig {
    /// Minimum stream similarity for attributing it to the target. The best
    /// stream must exceed this strictly, otherwise the turn is discarded.
    pub accept_threshold: f32,
    /// Worker threads for overlap turns. Turns are independent, so anything
    /// above 1 only changes wall-clock time, never the output.
    pub workers: usize,
    /// When set, every separated stream is written here for inspection.
    pub dump_dir: Option<PathBuf>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.5,
            workers: 1,
            dump_dir: None,
        }
    }
}

/// Resolve overlap turns to target-speaker segments.
///
/// Turns that do not list the target are ignored. For the rest, the mixture
/// is split into two streams and the stream more similar to the target
/// embedding is kept, provided it clears the acceptance threshold. Output
/// follows input turn order; the combiner does the final time ordering.
///
/// Per-stream embedding failures only exclude that stream. A failed
/// separation call aborts the run.
pub fn resolve_overlaps(
    mixed: &AudioBuffer,
    overlap_turns: &[OverlapTurn],
    target: &SpeakerLabel,
    target_embedding: &Embedding,
    separator: &dyn SourceSeparator,
    encoder: &dyn SpeakerEncoder,
    config: &ResolveConfig,
) -> Result<Vec<ResolvedSegment>> {
    let jobs: Vec<(usize, &OverlapTurn)> = overlap_turns
        .iter()
        .enumerate()
        .filter(|(_, turn)| turn.contains(target))
        .collect();

    tracing::info!(
        total = overlap_turns.len(),
        with_target = jobs.len(),
        workers = config.workers.max(1),
        "resolving overlap turns"
    );
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let workers = config.workers.max(1).min(jobs.len());
    let mut by_index: BTreeMap<usize, Option<ResolvedSegment>> = BTreeMap::new();

    if workers == 1 {
        for (index, turn) in jobs {
            let outcome =
                resolve_turn(mixed, index, turn, target_embedding, separator, encoder, config)?;
            by_index.insert(index, outcome);
        }
    } else {
        let (job_tx, job_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        for &job in &jobs {
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        std::thread::scope(|scope| -> Result<()> {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    while let Ok((index, turn)) = job_rx.recv() {
                        let outcome = resolve_turn(
                            mixed,
                            index,
                            turn,
                            target_embedding,
                            separator,
                            encoder,
                            config,
                        );
                        if result_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            let mut first_error: Option<SeparationError> = None;
            for (index, outcome) in result_rx.iter() {
                match outcome {
                    Ok(segment) => {
                        by_index.insert(index, segment);
                    }
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
            match first_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })?;
    }

    let accepted: Vec<ResolvedSegment> = by_index.into_values().flatten().collect();
    tracing::info!(accepted = accepted.len(), "overlap resolution complete");
    Ok(accepted)
}

fn resolve_turn(
    mixed: &AudioBuffer,
    index: usize,
    turn: &OverlapTurn,
    target_embedding: &Embedding,
    separator: &dyn SourceSeparator,
    encoder: &dyn SpeakerEncoder,
    config: &ResolveConfig,
) -> Result<Option<ResolvedSegment>> {
    if turn.speakers.len() > 2 {
        // The separator is two-source only; the extra voices end up smeared
        // across both streams.
        tracing::debug!(
            start = turn.interval.start,
            end = turn.interval.end,
            speakers = turn.speakers.len(),
            "two-stream separation approximates a busier turn"
        );
    }

    let slice = mixed.slice_secs(turn.interval.start, turn.interval.end);
    if slice.is_empty() {
        tracing::warn!(
            start = turn.interval.start,
            end = turn.interval.end,
            "overlap turn lies outside the loaded audio, skipping"
        );
        return Ok(None);
    }

    let (stream_a, stream_b) = separator.separate(slice, mixed.sample_rate)?;
    let output_rate = separator.output_sample_rate();

    if let Some(dir) = &config.dump_dir {
        dump_streams(dir, index, &stream_a, &stream_b, output_rate);
    }

    let mut best_similarity = -1.0f32;
    let mut best_stream: Option<Vec<f32>> = None;
    for (stream_index, stream) in [stream_a, stream_b].into_iter().enumerate() {
        let similarity = match encoder.embed(&stream, output_rate) {
            Ok(embedding) => embedding.cosine_similarity(target_embedding),
            Err(e) => {
                tracing::warn!(
                    stream = stream_index,
                    start = turn.interval.start,
                    end = turn.interval.end,
                    error = %e,
                    "stream embedding failed, stream excluded"
                );
                -1.0
            }
        };
        tracing::debug!(
            stream = stream_index,
            similarity,
            start = turn.interval.start,
            "stream similarity against target"
        );
        if similarity > best_similarity {
            best_similarity = similarity;
            best_stream = Some(stream);
        }
    }

    if best_similarity > config.accept_threshold {
        if let Some(samples) = best_stream {
            tracing::debug!(
                start = turn.interval.start,
                end = turn.interval.end,
                similarity = best_similarity,
                "accepted separated stream for target"
            );
            return Ok(Some(ResolvedSegment {
                samples,
                sample_rate: output_rate,
                interval: turn.interval,
            }));
        }
    }

    tracing::info!(
        start = turn.interval.start,
        end = turn.interval.end,
        best_similarity,
        threshold = config.accept_threshold,
        "discarding overlap turn, no stream attributable to target"
    );
    Ok(None)
}

fn dump_streams(dir: &Path, index: usize, stream_a: &[f32], stream_b: &[f32], sample_rate: u32) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        tracing::warn!(dir = %dir.display(), error = %e, "failed to create dump directory");
        return;
    }
    for (stream_index, samples) in [stream_a, stream_b].into_iter().enumerate() {
        let path = dir.join(format!("overlap_{index:03}_stream_{stream_index}.wav"));
        let buffer = AudioBuffer::new(samples.to_vec(), sample_rate);
        if let Err(e) = orate_audio::write_wav_mono(&path, &buffer) {
            tracing::warn!(path = %path.display(), error = %e, "failed to dump separated stream");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    /// Plays back the slice's first sample as stream 0 and its last sample
    /// as stream 1, each as a constant stream at the 8 kHz output rate.
    struct HalfSplitSeparator;

    impl SourceSeparator for HalfSplitSeparator {
        fn separate(&self, samples: &[f32], _sample_rate: u32) -> Result<(Vec<f32>, Vec<f32>)> {
            let first = samples.first().copied().unwrap_or(0.0);
            let last = samples.last().copied().unwrap_or(0.0);
            let len = samples.len() / 2;
            Ok((vec![first; len], vec![last; len]))
        }

        fn output_sample_rate(&self) -> u32 {
            8000
        }
    }

    struct BrokenSeparator;

    impl SourceSeparator for BrokenSeparator {
        fn separate(&self, _samples: &[f32], _sample_rate: u32) -> Result<(Vec<f32>, Vec<f32>)> {
            Err(SeparationError::SeparationFailed("model crashed".into()))
        }

        fn output_sample_rate(&self) -> u32 {
            8000
        }
    }

    /// Encodes a constant stream as a unit vector whose cosine similarity
    /// against the all-ones target embedding equals that constant.
    struct ConstEncoder;

    impl SpeakerEncoder for ConstEncoder {
        fn embed(&self, samples: &[f32], _sample_rate: u32) -> orate_speaker::Result<Embedding> {
            let value = samples.first().copied().ok_or_else(|| {
                orate_speaker::SpeakerError::EmbeddingFailed("empty input".into())
            })?;
            if value.is_nan() {
                return Err(orate_speaker::SpeakerError::EmbeddingFailed(
                    "degenerate input".into(),
                ));
            }
            Ok(Embedding::new(vec![
                value,
                (1.0 - value * value).max(0.0).sqrt(),
            ]))
        }
    }

    fn target_embedding() -> Embedding {
        Embedding::new(vec![1.0, 0.0])
    }

    fn overlap(start: f64, end: f64, speakers: &[&str]) -> OverlapTurn {
        OverlapTurn {
            interval: TimeInterval::new(start, end),
            speakers: speakers.iter().map(|s| SpeakerLabel::new(*s)).collect::<BTreeSet<_>>(),
        }
    }

    /// Mixed audio where each turn's span starts with the stream-0 marker
    /// and ends with the stream-1 marker.
    fn mixed_with(turns: &[(f64, f64, f32, f32)]) -> AudioBuffer {
        let mut samples = vec![0.0f32; 16000 * 60];
        for &(start, end, first, last) in turns {
            let lo = (start * 16000.0) as usize;
            let hi = (end * 16000.0) as usize;
            let mid = (lo + hi) / 2;
            for sample in &mut samples[lo..mid] {
                *sample = first;
            }
            for sample in &mut samples[mid..hi] {
                *sample = last;
            }
        }
        AudioBuffer::new(samples, 16000)
    }

    fn resolve(
        mixed: &AudioBuffer,
        turns: &[OverlapTurn],
        config: &ResolveConfig,
    ) -> Result<Vec<ResolvedSegment>> {
        resolve_overlaps(
            mixed,
            turns,
            &SpeakerLabel::new("SPEAKER_00"),
            &target_embedding(),
            &HalfSplitSeparator,
            &ConstEncoder,
            config,
        )
    }

    #[test]
    fn test_accepts_stream_above_threshold() {
        let mixed = mixed_with(&[(0.0, 2.0, 0.51, 0.2)]);
        let turns = vec![overlap(0.0, 2.0, &["SPEAKER_00", "SPEAKER_01"])];
        let accepted = resolve(&mixed, &turns, &ResolveConfig::default()).unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].sample_rate, 8000);
        assert!((accepted[0].samples[0] - 0.51).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_stream_below_threshold() {
        let mixed = mixed_with(&[(0.0, 2.0, 0.49, 0.2)]);
        let turns = vec![overlap(0.0, 2.0, &["SPEAKER_00", "SPEAKER_01"])];
        let accepted = resolve(&mixed, &turns, &ResolveConfig::default()).unwrap();
        assert!(accepted.is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        let mixed = mixed_with(&[(0.0, 2.0, 0.5, 0.2)]);
        let turns = vec![overlap(0.0, 2.0, &["SPEAKER_00", "SPEAKER_01"])];
        let accepted = resolve(&mixed, &turns, &ResolveConfig::default()).unwrap();
        assert!(accepted.is_empty());
    }

    #[test]
    fn test_picks_more_similar_stream() {
        let mixed = mixed_with(&[(0.0, 2.0, 0.6, 0.9)]);
        let turns = vec![overlap(0.0, 2.0, &["SPEAKER_00", "SPEAKER_01"])];
        let accepted = resolve(&mixed, &turns, &ResolveConfig::default()).unwrap();
        assert_eq!(accepted.len(), 1);
        assert!((accepted[0].samples[0] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_failed_stream_embedding_leaves_other_selectable() {
        let mixed = mixed_with(&[(0.0, 2.0, f32::NAN, 0.8)]);
        let turns = vec![overlap(0.0, 2.0, &["SPEAKER_00", "SPEAKER_01"])];
        let accepted = resolve(&mixed, &turns, &ResolveConfig::default()).unwrap();
        assert_eq!(accepted.len(), 1);
        assert!((accepted[0].samples[0] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_both_streams_failing_discards_turn() {
        let mixed = mixed_with(&[(0.0, 2.0, f32::NAN, f32::NAN)]);
        let turns = vec![overlap(0.0, 2.0, &["SPEAKER_00", "SPEAKER_01"])];
        let accepted = resolve(&mixed, &turns, &ResolveConfig::default()).unwrap();
        assert!(accepted.is_empty());
    }

    #[test]
    fn test_turns_without_target_are_ignored() {
        let mixed = mixed_with(&[(0.0, 2.0, 0.9, 0.9)]);
        let turns = vec![overlap(0.0, 2.0, &["SPEAKER_01", "SPEAKER_02"])];
        // BrokenSeparator proves the separator is never invoked.
        let accepted = resolve_overlaps(
            &mixed,
            &turns,
            &SpeakerLabel::new("SPEAKER_00"),
            &target_embedding(),
            &BrokenSeparator,
            &ConstEncoder,
            &ResolveConfig::default(),
        )
        .unwrap();
        assert!(accepted.is_empty());
    }

    #[test]
    fn test_separator_failure_is_fatal() {
        let mixed = mixed_with(&[(0.0, 2.0, 0.9, 0.9)]);
        let turns = vec![overlap(0.0, 2.0, &["SPEAKER_00", "SPEAKER_01"])];
        let result = resolve_overlaps(
            &mixed,
            &turns,
            &SpeakerLabel::new("SPEAKER_00"),
            &target_embedding(),
            &BrokenSeparator,
            &ConstEncoder,
            &ResolveConfig::default(),
        );
        assert!(matches!(result, Err(SeparationError::SeparationFailed(_))));
    }

    #[test]
    fn test_output_follows_input_turn_order() {
        let mixed = mixed_with(&[(10.0, 11.0, 0.9, 0.2), (0.0, 1.0, 0.8, 0.2)]);
        let turns = vec![
            overlap(10.0, 11.0, &["SPEAKER_00", "SPEAKER_01"]),
            overlap(0.0, 1.0, &["SPEAKER_00", "SPEAKER_01"]),
        ];
        let accepted = resolve(&mixed, &turns, &ResolveConfig::default()).unwrap();
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].interval.start, 10.0);
        assert_eq!(accepted[1].interval.start, 0.0);
    }

    #[test]
    fn test_pool_matches_sequential() {
        let spans = [
            (0.0, 2.0, 0.9, 0.1),
            (3.0, 4.0, 0.2, 0.7),
            (5.0, 6.5, 0.4, 0.3),
            (8.0, 9.0, f32::NAN, 0.95),
            (12.0, 13.0, 0.55, 0.1),
            (20.0, 22.0, 0.1, 0.05),
        ];
        let mixed = mixed_with(&spans);
        let turns: Vec<OverlapTurn> = spans
            .iter()
            .map(|&(start, end, _, _)| overlap(start, end, &["SPEAKER_00", "SPEAKER_01"]))
            .collect();

        let sequential = resolve(&mixed, &turns, &ResolveConfig::default()).unwrap();
        let pooled = resolve(
            &mixed,
            &turns,
            &ResolveConfig {
                workers: 4,
                ..ResolveConfig::default()
            },
        )
        .unwrap();

        assert_eq!(sequential.len(), pooled.len());
        for (a, b) in sequential.iter().zip(pooled.iter()) {
            assert_eq!(a.interval, b.interval);
            assert_eq!(a.samples, b.samples);
        }
    }

    #[test]
    fn test_debug_dump_creates_dir_and_writes_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let dump_dir = dir.path().join("separated_segments");
        let mixed = mixed_with(&[(0.0, 2.0, 0.9, 0.2)]);
        let turns = vec![overlap(0.0, 2.0, &["SPEAKER_00", "SPEAKER_01"])];
        let config = ResolveConfig {
            dump_dir: Some(dump_dir.clone()),
            ..ResolveConfig::default()
        };
        resolve(&mixed, &turns, &config).unwrap();

        let mut names: Vec<String> = std::fs::read_dir(&dump_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![
            "overlap_000_stream_0.wav".to_string(),
            "overlap_000_stream_1.wav".to_string(),
        ]);
    }
}

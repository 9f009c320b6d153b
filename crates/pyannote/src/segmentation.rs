use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;

use orate_audio::{resample_linear, CANONICAL_SAMPLE_RATE};
use orate_diarization::{DiarizationError, Diarizer, SpeakerLabel, SpeakerTurn, TimeInterval};
use orate_speaker::SpeakerEncoder;

use crate::cluster::SpeakerRegistry;
use crate::encoder::WespeakerEncoder;
use crate::{build_session, PyannoteError, Result};

/// Samples between consecutive output frames of the segmentation model.
const FRAME_STEP: usize = 270;
/// Sample position of the first output frame's receptive field center.
const FRAME_START: usize = 721;
const WINDOW_SECS: usize = 10;

/// Powerset classes of segmentation-3.0: silence, three single speakers,
/// then the three two-speaker combinations.
const POWERSET: [&[usize]; 7] = [&[], &[0], &[1], &[2], &[0, 1], &[0, 2], &[1, 2]];

#[derive(Debug, Clone)]
pub struct DiarizeConfig {
    /// Upper bound on distinct matched speakers across the recording.
    pub max_speakers: usize,
    /// Minimum cosine similarity to fold a window-local speaker into a
    /// known one.
    pub merge_threshold: f32,
    /// Minimum solo speech per window to attempt an embedding.
    pub min_embed_secs: f64,
    /// Adjacent turns of the same speaker set closer than this merge.
    pub merge_gap_secs: f64,
}

impl Default for DiarizeConfig {
    fn default() -> Self {
        Self {
            max_speakers: 4,
            merge_threshold: 0.5,
            min_embed_secs: 0.5,
            merge_gap_secs: 0.5,
        }
    }
}

/// Frame-level diarization with the pyannote segmentation-3.0 model.
///
/// The recording is processed in 10 second windows. Each window yields
/// per-frame powerset classes; runs of the same class become turns, and
/// window-local speakers are folded into recording-wide labels by embedding
/// similarity.
#[derive(Debug)]
pub struct PyannoteDiarizer {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    encoder: WespeakerEncoder,
    config: DiarizeConfig,
}

impl PyannoteDiarizer {
    pub fn load(
        segmentation_model: impl AsRef<Path>,
        embedding_model: impl AsRef<Path>,
        config: DiarizeConfig,
    ) -> Result<Self> {
        let session = build_session(segmentation_model.as_ref())?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| PyannoteError::Model("segmentation model has no inputs".to_string()))?;

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name == "output")
            .map(|o| o.name.clone())
            .or_else(|| session.outputs.first().map(|o| o.name.clone()))
            .ok_or_else(|| {
                PyannoteError::Model("segmentation model has no outputs".to_string())
            })?;

        let encoder = WespeakerEncoder::load(embedding_model)?;

        tracing::info!(
            model = %segmentation_model.as_ref().display(),
            "loaded segmentation model"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            encoder,
            config,
        })
    }

    /// Per-frame powerset class indices for one fixed-size window.
    fn segment_window(&self, window: &[f32]) -> Result<Vec<usize>> {
        let input = Tensor::from_array(([1i64, 1, window.len() as i64], window.to_vec()))
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
            .ok_or_else(|| PyannoteError::Inference("missing segmentation output".to_string()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PyannoteError::Inference(e.to_string()))?;

        let classes = shape.as_ref().last().copied().unwrap_or(0) as usize;
        if classes == 0 || classes > POWERSET.len() {
            return Err(PyannoteError::Inference(format!(
                "unexpected segmentation class count {classes}"
            )));
        }
        Ok(data.chunks_exact(classes).map(argmax).collect())
    }
}

impl Diarizer for PyannoteDiarizer {
    fn diarize(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> orate_diarization::Result<Vec<SpeakerTurn>> {
        let audio = resample_linear(samples, sample_rate, CANONICAL_SAMPLE_RATE);
        if audio.is_empty() {
            return Ok(Vec::new());
        }
        let rate = CANONICAL_SAMPLE_RATE;
        let duration = audio.len() as f64 / rate as f64;
        let window_len = rate as usize * WINDOW_SECS;

        let mut registry =
            SpeakerRegistry::new(self.config.max_speakers, self.config.merge_threshold);
        let mut turns: Vec<SpeakerTurn> = Vec::new();

        for win_start in (0..audio.len()).step_by(window_len) {
            let win_end = (win_start + window_len).min(audio.len());
            let mut window = audio[win_start..win_end].to_vec();
            window.resize(window_len, 0.0);

            let classes = self
                .segment_window(&window)
                .map_err(|e| DiarizationError::ProcessingError(e.to_string()))?;
            let runs = class_runs(&classes);

            let labels = assign_window_labels(
                &audio,
                rate,
                win_start,
                &runs,
                &self.encoder,
                &mut registry,
                self.config.min_embed_secs,
            );

            for run in &runs {
                let speakers: BTreeSet<SpeakerLabel> = POWERSET[run.class]
                    .iter()
                    .filter_map(|local| labels.get(local).cloned())
                    .collect();
                if speakers.is_empty() {
                    continue;
                }
                let start = frame_time(win_start, run.start_frame, rate);
                let end = frame_time(win_start, run.end_frame, rate).min(duration);
                if start >= end {
                    continue;
                }
                turns.push(SpeakerTurn {
                    interval: TimeInterval::new(start, end),
                    speakers,
                });
            }
        }

        let turns = merge_adjacent(turns, self.config.merge_gap_secs);
        tracing::info!(
            turns = turns.len(),
            duration_secs = duration,
            "diarization finished"
        );
        Ok(turns)
    }
}

/// Index of the best-scoring class; the first maximum wins.
fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    for (index, value) in row.iter().enumerate() {
        if *value > row[best] {
            best = index;
        }
    }
    best
}

/// Maximal run of consecutive frames sharing one non-silence class.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FrameRun {
    class: usize,
    start_frame: usize,
    /// Exclusive.
    end_frame: usize,
}

fn class_runs(classes: &[usize]) -> Vec<FrameRun> {
    let mut runs: Vec<FrameRun> = Vec::new();
    for (frame, &class) in classes.iter().enumerate() {
        if class == 0 {
            continue;
        }
        match runs.last_mut() {
            Some(run) if run.class == class && run.end_frame == frame => {
                run.end_frame = frame + 1;
            }
            _ => runs.push(FrameRun {
                class,
                start_frame: frame,
                end_frame: frame + 1,
            }),
        }
    }
    runs
}

fn frame_sample(win_start: usize, frame: usize) -> usize {
    win_start + FRAME_START + frame * FRAME_STEP
}

fn frame_time(win_start: usize, frame: usize, sample_rate: u32) -> f64 {
    frame_sample(win_start, frame) as f64 / sample_rate as f64
}

/// Fold this window's local speakers into recording-wide labels.
///
/// A local speaker with enough solo audio is embedded and matched through
/// the registry; anything else gets a fresh label that cannot attract later
/// windows.
fn assign_window_labels(
    audio: &[f32],
    sample_rate: u32,
    win_start: usize,
    runs: &[FrameRun],
    encoder: &dyn SpeakerEncoder,
    registry: &mut SpeakerRegistry,
    min_embed_secs: f64,
) -> BTreeMap<usize, SpeakerLabel> {
    let mut solo: BTreeMap<usize, Vec<f32>> = BTreeMap::new();
    let mut present: BTreeSet<usize> = BTreeSet::new();

    for run in runs {
        let speakers = POWERSET[run.class];
        present.extend(speakers.iter().copied());
        if let [only] = speakers {
            let lo = frame_sample(win_start, run.start_frame).min(audio.len());
            let hi = frame_sample(win_start, run.end_frame).min(audio.len());
            solo.entry(*only)
                .or_default()
                .extend_from_slice(&audio[lo..hi]);
        }
    }

    let min_samples = (min_embed_secs * sample_rate as f64) as usize;
    let mut labels = BTreeMap::new();
    for local in present {
        let samples = solo.get(&local).map(Vec::as_slice).unwrap_or(&[]);
        let label = if samples.len() >= min_samples && !samples.is_empty() {
            match encoder.embed(samples, sample_rate) {
                Ok(embedding) => registry.assign(&embedding),
                Err(e) => {
                    tracing::warn!(local, error = %e, "window speaker embedding failed");
                    registry.mint_unmatched()
                }
            }
        } else {
            tracing::debug!(
                local,
                solo_samples = samples.len(),
                "not enough solo audio to match window speaker"
            );
            registry.mint_unmatched()
        };
        labels.insert(local, label);
    }
    labels
}

/// Merge chronologically adjacent turns spoken by the same speaker set.
fn merge_adjacent(mut turns: Vec<SpeakerTurn>, max_gap: f64) -> Vec<SpeakerTurn> {
    turns.sort_by(|a, b| a.interval.start.total_cmp(&b.interval.start));
    let mut merged: Vec<SpeakerTurn> = Vec::new();
    for turn in turns {
        if let Some(last) = merged.last_mut() {
            let gap = turn.interval.start - last.interval.end;
            if last.speakers == turn.speakers && gap <= max_gap {
                last.interval.end = last.interval.end.max(turn.interval.end);
                continue;
            }
        }
        merged.push(turn);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use orate_speaker::{Embedding, SpeakerError};

    #[test]
    fn test_argmax_first_max_wins() {
        assert_eq!(argmax(&[0.1, 0.8, 0.8]), 1);
        assert_eq!(argmax(&[0.9, 0.1]), 0);
    }

    #[test]
    fn test_powerset_covers_overlap_classes() {
        assert_eq!(POWERSET[0], &[] as &[usize]);
        assert_eq!(POWERSET[2], &[1]);
        assert_eq!(POWERSET[4], &[0, 1]);
        assert_eq!(POWERSET[6], &[1, 2]);
    }

    #[test]
    fn test_class_runs_split_on_change_and_silence() {
        let runs = class_runs(&[0, 1, 1, 4, 4, 0, 2]);
        assert_eq!(
            runs,
            vec![
                FrameRun {
                    class: 1,
                    start_frame: 1,
                    end_frame: 3
                },
                FrameRun {
                    class: 4,
                    start_frame: 3,
                    end_frame: 5
                },
                FrameRun {
                    class: 2,
                    start_frame: 6,
                    end_frame: 7
                },
            ]
        );
    }

    #[test]
    fn test_frame_time_geometry() {
        assert!((frame_time(0, 0, 16000) - 721.0 / 16000.0).abs() < 1e-9);
        assert!((frame_time(160000, 0, 16000) - 160721.0 / 16000.0).abs() < 1e-9);
        assert!(frame_time(0, 1, 16000) > frame_time(0, 0, 16000));
    }

    fn turn(start: f64, end: f64, speakers: &[&str]) -> SpeakerTurn {
        SpeakerTurn {
            interval: TimeInterval::new(start, end),
            speakers: speakers.iter().map(|s| SpeakerLabel::new(*s)).collect(),
        }
    }

    #[test]
    fn test_merge_adjacent_same_set_within_gap() {
        let merged = merge_adjacent(vec![turn(0.0, 1.0, &["A"]), turn(1.2, 2.0, &["A"])], 0.5);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].interval.end, 2.0);
    }

    #[test]
    fn test_merge_adjacent_respects_speaker_set() {
        let merged = merge_adjacent(
            vec![turn(0.0, 1.0, &["A"]), turn(1.1, 2.0, &["A", "B"])],
            0.5,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_adjacent_respects_gap() {
        let merged = merge_adjacent(vec![turn(0.0, 1.0, &["A"]), turn(2.0, 3.0, &["A"])], 0.5);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_adjacent_sorts_first() {
        let merged = merge_adjacent(vec![turn(1.2, 2.0, &["A"]), turn(0.0, 1.0, &["A"])], 0.5);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].interval.start, 0.0);
    }

    /// Embeds the mean sample value; distinct constants land far apart.
    struct MeanEncoder;

    impl SpeakerEncoder for MeanEncoder {
        fn embed(&self, samples: &[f32], _sample_rate: u32) -> orate_speaker::Result<Embedding> {
            if samples.is_empty() {
                return Err(SpeakerError::EmbeddingFailed("empty input".into()));
            }
            let mean = samples.iter().sum::<f32>() / samples.len() as f32;
            Ok(Embedding::new(vec![mean, 1.0 - mean]))
        }
    }

    fn fill_frames(
        audio: &mut [f32],
        win_start: usize,
        start_frame: usize,
        end_frame: usize,
        value: f32,
    ) {
        let lo = frame_sample(win_start, start_frame);
        let hi = frame_sample(win_start, end_frame);
        for sample in &mut audio[lo..hi] {
            *sample = value;
        }
    }

    #[test]
    fn test_window_speakers_fold_across_windows() {
        let mut audio = vec![0.0f32; 320000];
        fill_frames(&mut audio, 0, 0, 30, 0.9);
        fill_frames(&mut audio, 0, 40, 70, 0.1);
        fill_frames(&mut audio, 160000, 0, 30, 0.9);

        let mut registry = SpeakerRegistry::new(4, 0.5);
        let first_window = vec![
            FrameRun {
                class: 1,
                start_frame: 0,
                end_frame: 30,
            },
            FrameRun {
                class: 2,
                start_frame: 40,
                end_frame: 70,
            },
        ];
        let first = assign_window_labels(
            &audio,
            16000,
            0,
            &first_window,
            &MeanEncoder,
            &mut registry,
            0.5,
        );
        assert_ne!(first[&0], first[&1]);

        let second_window = vec![
            FrameRun {
                class: 1,
                start_frame: 0,
                end_frame: 30,
            },
            FrameRun {
                class: 5,
                start_frame: 35,
                end_frame: 40,
            },
        ];
        let second = assign_window_labels(
            &audio,
            16000,
            160000,
            &second_window,
            &MeanEncoder,
            &mut registry,
            0.5,
        );
        assert_eq!(second[&0], first[&0]);
        // The overlap-only speaker has nothing to embed and stays separate.
        assert_ne!(second[&2], first[&0]);
        assert_ne!(second[&2], first[&1]);
    }

    #[test]
    fn test_insufficient_solo_gets_fresh_label() {
        let audio = vec![0.5f32; 160000];
        let mut registry = SpeakerRegistry::new(4, 0.5);
        let runs = vec![FrameRun {
            class: 1,
            start_frame: 0,
            end_frame: 2,
        }];
        let labels =
            assign_window_labels(&audio, 16000, 0, &runs, &MeanEncoder, &mut registry, 0.5);
        assert_eq!(labels.len(), 1);
        assert!(labels.contains_key(&0));
    }

    #[test]
    fn test_missing_models_are_errors() {
        let result = PyannoteDiarizer::load(
            "/nonexistent/segmentation.onnx",
            "/nonexistent/wespeaker.onnx",
            DiarizeConfig::default(),
        );
        assert!(matches!(result, Err(PyannoteError::Model(_))));
    }
}

use orate_audio::{resample_linear, AudioBuffer};
use orate_diarization::{MonoTurn, SpeakerLabel, TimeInterval};
use orate_separation::ResolvedSegment;

struct Fragment {
    start: f64,
    samples: Vec<f32>,
}

/// Stitch the target speaker's audio back together.
///
/// Mono turns are cut straight from the mixed signal. Overlap-derived
/// segments are admitted only where they do not intersect an interval already
/// covered, which absorbs the small boundary disagreements between the mono
/// and overlap annotations. Fragments are then ordered by start time and
/// abutted; gaps between them are not reinserted.
///
/// The result is always a usable waveform: with nothing to emit it degrades
/// to a single silent sample.
pub fn combine_segments(
    mixed: &AudioBuffer,
    target: &SpeakerLabel,
    mono_turns: &[MonoTurn],
    overlap_segments: &[ResolvedSegment],
) -> AudioBuffer {
    let mut used: Vec<TimeInterval> = Vec::new();
    let mut fragments: Vec<Fragment> = Vec::new();

    for turn in mono_turns {
        if turn.speaker != *target {
            continue;
        }
        let slice = mixed.slice_secs(turn.interval.start, turn.interval.end);
        fragments.push(Fragment {
            start: turn.interval.start,
            samples: slice.to_vec(),
        });
        used.push(turn.interval);
    }
    let mono_count = fragments.len();

    let mut overlap_dropped = 0usize;
    for segment in overlap_segments {
        if used.iter().any(|interval| segment.interval.overlaps(interval)) {
            tracing::debug!(
                start = segment.interval.start,
                end = segment.interval.end,
                "dropping overlap-derived segment, duplicates covered audio"
            );
            overlap_dropped += 1;
            continue;
        }
        let samples =
            resample_linear(&segment.samples, segment.sample_rate, mixed.sample_rate).into_owned();
        fragments.push(Fragment {
            start: segment.interval.start,
            samples,
        });
        used.push(segment.interval);
    }

    tracing::info!(
        mono = mono_count,
        overlap_kept = fragments.len() - mono_count,
        overlap_dropped,
        "combining target speaker segments"
    );

    let total: usize = fragments.iter().map(|f| f.samples.len()).sum();
    if total == 0 {
        tracing::warn!("no audio fragments for target, emitting silent waveform");
        return AudioBuffer::silent(mixed.sample_rate);
    }

    fragments.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut samples = Vec::with_capacity(total);
    for fragment in &fragments {
        samples.extend_from_slice(&fragment.samples);
    }
    AudioBuffer::new(samples, mixed.sample_rate)
}

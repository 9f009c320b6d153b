use std::collections::BTreeSet;
use std::fmt;

use crate::TimeInterval;

/// Opaque speaker identifier assigned by the diarizer. Labels are not stable
/// across runs or files; equality is the only meaningful operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpeakerLabel(String);

impl SpeakerLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeakerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw diarizer annotation: one span plus every speaker heard in it.
#[derive(Debug, Clone)]
pub struct SpeakerTurn {
    pub interval: TimeInterval,
    pub speakers: BTreeSet<SpeakerLabel>,
}

/// Span attributed to exactly one speaker.
#[derive(Debug, Clone)]
pub struct MonoTurn {
    pub interval: TimeInterval,
    pub speaker: SpeakerLabel,
}

/// Span where two or more speakers talk concurrently.
#[derive(Debug, Clone)]
pub struct OverlapTurn {
    pub interval: TimeInterval,
    pub speakers: BTreeSet<SpeakerLabel>,
}

impl OverlapTurn {
    pub fn contains(&self, label: &SpeakerLabel) -> bool {
        self.speakers.contains(label)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TurnSet {
    pub mono: Vec<MonoTurn>,
    pub overlap: Vec<OverlapTurn>,
}

/// Split raw turns into mono and overlap turns by speaker count.
/// Turns with an invalid interval or no speakers are logged and dropped.
pub fn classify_turns(turns: Vec<SpeakerTurn>) -> TurnSet {
    let mut set = TurnSet::default();
    for turn in turns {
        if !turn.interval.is_valid() || turn.speakers.is_empty() {
            tracing::warn!(
                start = turn.interval.start,
                end = turn.interval.end,
                speakers = turn.speakers.len(),
                "dropping malformed diarization turn"
            );
            continue;
        }
        if turn.speakers.len() == 1 {
            let speaker = turn
                .speakers
                .into_iter()
                .next()
                .unwrap_or_else(|| SpeakerLabel::new(""));
            set.mono.push(MonoTurn {
                interval: turn.interval,
                speaker,
            });
        } else {
            set.overlap.push(OverlapTurn {
                interval: turn.interval,
                speakers: turn.speakers,
            });
        }
    }
    tracing::debug!(
        mono = set.mono.len(),
        overlap = set.overlap.len(),
        "classified diarization turns"
    );
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(start: f64, end: f64, speakers: &[&str]) -> SpeakerTurn {
        SpeakerTurn {
            interval: TimeInterval::new(start, end),
            speakers: speakers.iter().map(|s| SpeakerLabel::new(*s)).collect(),
        }
    }

    #[test]
    fn test_single_speaker_goes_mono() {
        let set = classify_turns(vec![turn(0.0, 1.0, &["SPEAKER_00"])]);
        assert_eq!(set.mono.len(), 1);
        assert!(set.overlap.is_empty());
        assert_eq!(set.mono[0].speaker.as_str(), "SPEAKER_00");
    }

    #[test]
    fn test_multiple_speakers_go_overlap() {
        let set = classify_turns(vec![turn(0.0, 1.0, &["SPEAKER_00", "SPEAKER_01"])]);
        assert!(set.mono.is_empty());
        assert_eq!(set.overlap.len(), 1);
        assert_eq!(set.overlap[0].speakers.len(), 2);
    }

    #[test]
    fn test_malformed_turns_dropped() {
        let set = classify_turns(vec![
            turn(1.0, 1.0, &["SPEAKER_00"]),
            turn(2.0, 1.0, &["SPEAKER_00"]),
            turn(0.0, 1.0, &[]),
        ]);
        assert!(set.mono.is_empty());
        assert!(set.overlap.is_empty());
    }

    #[test]
    fn test_input_order_preserved() {
        let set = classify_turns(vec![
            turn(5.0, 6.0, &["SPEAKER_01"]),
            turn(0.0, 1.0, &["SPEAKER_00"]),
        ]);
        assert_eq!(set.mono[0].interval.start, 5.0);
        assert_eq!(set.mono[1].interval.start, 0.0);
    }

    #[test]
    fn test_overlap_contains() {
        let set = classify_turns(vec![turn(0.0, 1.0, &["SPEAKER_00", "SPEAKER_01"])]);
        assert!(set.overlap[0].contains(&SpeakerLabel::new("SPEAKER_00")));
        assert!(!set.overlap[0].contains(&SpeakerLabel::new("SPEAKER_02")));
    }
}

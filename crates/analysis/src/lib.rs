//! Transcript statistics for speech coaching reports.

mod fillers;
mod report;

pub use fillers::FillerLexicon;
pub use report::{analyze_transcript, SpeechMetrics, SpeechReport};

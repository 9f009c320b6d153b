use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::FillerLexicon;

static WORD_RE: OnceLock<Regex> = OnceLock::new();
static SENTENCE_RE: OnceLock<Regex> = OnceLock::new();

fn word_re() -> &'static Regex {
    WORD_RE.get_or_init(|| Regex::new(r"\w+").unwrap())
}

fn sentence_re() -> &'static Regex {
    SENTENCE_RE.get_or_init(|| Regex::new(r"[.!?]+").unwrap())
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeechMetrics {
    pub total_words: usize,
    pub unique_words: usize,
    pub type_token_ratio: f64,
    pub sentence_count: usize,
    pub avg_sentence_length: f64,
    pub filler_total: usize,
    pub filler_unique: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeechReport {
    pub metrics: SpeechMetrics,
    /// Filler phrase to occurrence count; absent phrases are omitted.
    pub filler_counts: BTreeMap<String, usize>,
    /// Most frequent words, count descending then alphabetical.
    pub top_words: Vec<(String, usize)>,
}

/// Compute transcript statistics against a filler lexicon.
pub fn analyze_transcript(text: &str, fillers: &FillerLexicon) -> SpeechReport {
    let tokens = tokenize(text);
    let total_words = tokens.len();
    let unique_words = tokens.iter().collect::<BTreeSet<_>>().len();
    let type_token_ratio = if total_words == 0 {
        0.0
    } else {
        unique_words as f64 / total_words as f64
    };

    let sentences: Vec<&str> = sentence_re()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let sentence_count = sentences.len();
    let avg_sentence_length = if sentence_count == 0 {
        0.0
    } else {
        sentences
            .iter()
            .map(|s| word_re().find_iter(s).count())
            .sum::<usize>() as f64
            / sentence_count as f64
    };

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for token in &tokens {
        *counts.entry(token.as_str()).or_default() += 1;
    }
    let mut top_words: Vec<(String, usize)> = counts
        .iter()
        .map(|(word, count)| (word.to_string(), *count))
        .collect();
    top_words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_words.truncate(10);

    let mut filler_counts = BTreeMap::new();
    for entry in fillers.entries() {
        let phrase = tokenize(entry);
        let count = count_phrase(&tokens, &phrase);
        if count > 0 {
            filler_counts.insert(entry.clone(), count);
        }
    }
    let filler_total = filler_counts.values().sum();
    let filler_unique = filler_counts.len();

    tracing::debug!(
        total_words,
        unique_words,
        sentence_count,
        filler_total,
        "analyzed transcript"
    );

    SpeechReport {
        metrics: SpeechMetrics {
            total_words,
            unique_words,
            type_token_ratio,
            sentence_count,
            avg_sentence_length,
            filler_total,
            filler_unique,
        },
        filler_counts,
        top_words,
    }
}

impl SpeechReport {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("## Basic metrics\n");
        out.push_str(&format!("- Total words: {}\n", self.metrics.total_words));
        out.push_str(&format!("- Unique words: {}\n", self.metrics.unique_words));
        out.push_str(&format!(
            "- Type-token ratio: {:.2}\n",
            self.metrics.type_token_ratio
        ));
        out.push_str(&format!(
            "- Average sentence length: {:.2}\n",
            self.metrics.avg_sentence_length
        ));
        out.push_str(&format!("- Sentences: {}\n", self.metrics.sentence_count));
        out.push_str(&format!("- Filler words: {}\n", self.metrics.filler_total));
        out.push_str(&format!(
            "- Distinct filler words: {}\n",
            self.metrics.filler_unique
        ));
        out.push_str("\n## Filler words\n");
        for (phrase, count) in &self.filler_counts {
            out.push_str(&format!("- {phrase}: {count}\n"));
        }
        out.push_str("\n## Top 10 frequent words\n");
        for (word, count) in &self.top_words {
            out.push_str(&format!("- {word}: {count}\n"));
        }
        out
    }
}

/// Lowercased word tokens in order of appearance.
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    word_re()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Occurrences of a word sequence in the token stream. Overlapping matches
/// all count.
fn count_phrase(tokens: &[String], phrase: &[String]) -> usize {
    if phrase.is_empty() || tokens.len() < phrase.len() {
        return 0;
    }
    tokens
        .windows(phrase.len())
        .filter(|window| window.iter().zip(phrase).all(|(a, b)| a == b))
        .count()
}

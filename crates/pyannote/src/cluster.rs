use orate_diarization::SpeakerLabel;
use orate_speaker::Embedding;

/// Running speaker directory for cross-window label assignment.
///
/// Matching is greedy: an embedding joins the best-scoring known speaker
/// above the threshold, otherwise it founds a new one until the cap is
/// reached, after which the nearest speaker takes it regardless of score.
#[derive(Debug)]
pub(crate) struct SpeakerRegistry {
    max_speakers: usize,
    threshold: f32,
    speakers: Vec<(SpeakerLabel, Vec<Embedding>)>,
    next_id: usize,
}

impl SpeakerRegistry {
    pub fn new(max_speakers: usize, threshold: f32) -> Self {
        Self {
            max_speakers: max_speakers.max(1),
            threshold,
            speakers: Vec::new(),
            next_id: 0,
        }
    }

    /// Label for an embedding, founding a new speaker when nothing matches.
    pub fn assign(&mut self, embedding: &Embedding) -> SpeakerLabel {
        let mut best: Option<(usize, f32)> = None;
        for (index, (_, observed)) in self.speakers.iter().enumerate() {
            let Some(mean) = Embedding::mean_of(observed) else {
                continue;
            };
            let similarity = mean.cosine_similarity(embedding);
            match best {
                Some((_, best_sim)) if similarity <= best_sim => {}
                _ => best = Some((index, similarity)),
            }
        }

        match best {
            Some((index, similarity)) if similarity > self.threshold => {
                self.speakers[index].1.push(embedding.clone());
                self.speakers[index].0.clone()
            }
            Some((index, similarity)) if self.speakers.len() >= self.max_speakers => {
                tracing::debug!(
                    speaker = %self.speakers[index].0,
                    similarity,
                    "speaker cap reached, folding into nearest"
                );
                self.speakers[index].1.push(embedding.clone());
                self.speakers[index].0.clone()
            }
            _ => {
                let label = self.mint_label();
                self.speakers.push((label.clone(), vec![embedding.clone()]));
                label
            }
        }
    }

    /// Fresh label for a speaker no embedding could be computed for. The
    /// label never attracts later matches.
    pub fn mint_unmatched(&mut self) -> SpeakerLabel {
        self.mint_label()
    }

    fn mint_label(&mut self) -> SpeakerLabel {
        let label = SpeakerLabel::new(format!("SPEAKER_{:02}", self.next_id));
        self.next_id += 1;
        label
    }
}

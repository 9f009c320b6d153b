/// Fixed-length voiceprint vector produced by a speaker encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Cosine similarity in [-1.0, 1.0]. Zero-magnitude vectors compare as 0.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        let dot: f32 = self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum();
        let norm_a: f32 = self.0.iter().map(|v| v * v).sum::<f32>().sqrt();
        let norm_b: f32 = other.0.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }

    /// Arithmetic mean of several embeddings. `None` for an empty slice.
    pub fn mean_of(embeddings: &[Embedding]) -> Option<Embedding> {
        let first = embeddings.first()?;
        let mut sum = vec![0.0f32; first.dim()];
        for embedding in embeddings {
            for (acc, value) in sum.iter_mut().zip(&embedding.0) {
                *acc += value;
            }
        }
        let count = embeddings.len() as f32;
        Some(Embedding(sum.into_iter().map(|v| v / count).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let a = Embedding::new(vec![0.5, 0.5, 0.0]);
        assert!((a.cosine_similarity(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.cosine_similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.cosine_similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.cosine_similarity(&b), 0.0);
    }

    #[test]
    fn test_mean_of_embeddings() {
        let mean = Embedding::mean_of(&[
            Embedding::new(vec![1.0, 0.0]),
            Embedding::new(vec![0.0, 1.0]),
        ])
        .unwrap();
        assert_eq!(mean.as_slice(), &[0.5, 0.5]);
    }

    #[test]
    fn test_mean_of_empty_is_none() {
        assert!(Embedding::mean_of(&[]).is_none());
    }
}

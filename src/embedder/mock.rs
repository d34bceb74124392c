/// Deterministic hashing embedder.
///
/// Produces bag-of-words vectors by feature hashing lowercase word tokens, so
/// texts sharing words land close together. Used by the test suite and for
/// offline runs without model files.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError, l2_normalize};

/// Model identifier recorded into indexes built with this embedder.
pub const MOCK_MODEL_ID: &str = "mock-hash";

/// A mock embedder that produces deterministic vectors from token hashes.
pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    /// Create a new `MockEmbedder` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, token: &str, salt: u8) -> (usize, f32) {
        let mut hasher = DefaultHasher::new();
        salt.hash(&mut hasher);
        token.hash(&mut hasher);
        let hash = hasher.finish();
        let idx = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        if self.dimensions == 0 {
            return Err(EmbedderError::InferenceFailed(
                "dimensions must be positive".to_string(),
            ));
        }

        let mut embedding = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let mut tokens = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .peekable();

        if tokens.peek().is_none() {
            // No word tokens: hash the raw text so the vector is still non-zero.
            let (idx, _) = self.bucket(text, 0);
            embedding[idx] = 1.0;
            return Ok(embedding);
        }

        for token in tokens {
            for salt in 0..2u8 {
                let (idx, sign) = self.bucket(token, salt);
                embedding[idx] += sign;
            }
        }

        let normalized = l2_normalize(&embedding);
        if normalized.iter().all(|v| *v == 0.0) {
            // Signed buckets cancelled out.
            let (idx, _) = self.bucket(&lowered, 0);
            embedding.iter_mut().for_each(|v| *v = 0.0);
            embedding[idx] = 1.0;
            return Ok(embedding);
        }
        Ok(normalized)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        MOCK_MODEL_ID
    }
}

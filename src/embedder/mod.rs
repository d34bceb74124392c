/// Embedder trait and shared types for text embedding.
///
/// Every implementation hands out L2-normalized vectors so that inner
/// product equals cosine similarity downstream.
pub mod download;
pub mod mock;
pub mod onnx;
pub mod tokenizer;

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),
}

/// What a piece of text is being embedded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedRole {
    /// A user question at serve time.
    Query,
    /// A document chunk at ingestion time.
    Passage,
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a unit-length vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into unit-length vectors, preserving order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;

    /// Identifier of the underlying model. Recorded into the index at build
    /// time and compared again at query time.
    fn model_id(&self) -> &str;

    /// Input prefix the model expects for a given role, if any.
    fn prefix(&self, _role: EmbedRole) -> Option<&'static str> {
        None
    }

    /// Embed a user question.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        match self.prefix(EmbedRole::Query) {
            Some(prefix) => self.embed(&format!("{prefix}{text}")),
            None => self.embed(text),
        }
    }

    /// Embed document passages in order.
    fn embed_passages(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        match self.prefix(EmbedRole::Passage) {
            Some(prefix) => {
                let prefixed: Vec<String> = texts.iter().map(|t| format!("{prefix}{t}")).collect();
                let refs: Vec<&str> = prefixed.iter().map(String::as_str).collect();
                self.embed_batch(&refs)
            }
            None => self.embed_batch(texts),
        }
    }
}

/// L2-normalize a vector, returning the normalized copy.
///
/// A zero vector is returned unchanged.
#[must_use]
pub fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return vec.to_vec();
    }

    let inv_norm = 1.0 / norm_sq.sqrt();
    vec.iter().map(|v| v * inv_norm).collect()
}

/// Euclidean length of a vector.
#[must_use]
pub fn l2_norm(vec: &[f32]) -> f32 {
    vec.iter().map(|v| v * v).sum::<f32>().sqrt()
}

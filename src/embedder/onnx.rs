/// ONNX Runtime embedder using the `ort` crate.
///
/// Loads a multilingual-e5-small ONNX model, runs batched inference, applies
/// mean pooling with the attention mask, and L2-normalizes each row.
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::tokenizer::BertTokenizer;
use super::{EmbedRole, Embedder, EmbedderError, l2_normalize};

/// ONNX-backed embedder implementing the `Embedder` trait.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: BertTokenizer,
    model_id: String,
    dimensions: usize,
}

impl OnnxEmbedder {
    /// Create a new `OnnxEmbedder` by loading a model from the given directory.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in `model_dir`. This is the
    /// expensive one-time initialization; share the result behind an `Arc`.
    pub fn new(model_dir: &Path, model_id: &str, dimensions: usize) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join("model.onnx");

        if !model_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        info!("Initializing ONNX Runtime...");

        let session = Session::builder()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .with_inter_threads(4)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model load error: {e}")))?;

        info!("ONNX model {model_id} loaded successfully");

        let tokenizer = BertTokenizer::from_model_dir(model_dir)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("tokenizer error: {e}")))?;

        info!("Tokenizer loaded (vocab size: {})", tokenizer.vocab_size());

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model_id: model_id.to_string(),
            dimensions,
        })
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut rows = self.embed_batch(&[text])?;
        rows.pop()
            .ok_or_else(|| EmbedderError::InferenceFailed("empty inference output".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batch = self
            .tokenizer
            .tokenize_batch(texts)
            .map_err(|e| EmbedderError::TokenizerError(e.to_string()))?;
        let shape = [batch.batch_size, batch.seq_len];
        debug!("Running inference on batch {}x{}", shape[0], shape[1]);

        // (shape, data) tuple form avoids ndarray version coupling with ort
        let input_ids_val = Tensor::from_array((shape, batch.input_ids.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(format!("input_ids error: {e}")))?;
        let attention_mask_val = Tensor::from_array((shape, batch.attention_mask.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(format!("attention_mask error: {e}")))?;
        let token_type_ids_val = Tensor::from_array((shape, batch.token_type_ids.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(format!("token_type_ids error: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedderError::InferenceFailed(format!("lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_val,
                "attention_mask" => attention_mask_val,
                "token_type_ids" => token_type_ids_val,
            ])
            .map_err(|e| EmbedderError::InferenceFailed(format!("inference failed: {e}")))?;

        // Output shape: [batch_size, seq_len, hidden_size]
        let (out_shape, hidden_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("output extraction: {e}")))?;

        let hidden_size = out_shape.last().copied().unwrap_or_default() as usize;
        if hidden_size != self.dimensions {
            return Err(EmbedderError::InferenceFailed(format!(
                "model produced {hidden_size}-dim output, expected {}",
                self.dimensions
            )));
        }

        pool_batch(
            hidden_data,
            &batch.attention_mask,
            batch.batch_size,
            batch.seq_len,
            hidden_size,
        )
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn prefix(&self, role: EmbedRole) -> Option<&'static str> {
        if !self.model_id.contains("e5") {
            return None;
        }
        match role {
            EmbedRole::Query => Some("query: "),
            EmbedRole::Passage => Some("passage: "),
        }
    }
}

/// Pools a `[batch_size, seq_len, hidden_size]` output into one normalized
/// vector per row.
fn pool_batch(
    hidden_data: &[f32],
    attention_mask: &[i64],
    batch_size: usize,
    seq_len: usize,
    hidden_size: usize,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    let row_len = seq_len * hidden_size;
    if hidden_data.len() != batch_size * row_len || attention_mask.len() != batch_size * seq_len {
        return Err(EmbedderError::InferenceFailed(format!(
            "output has {} values, expected {batch_size}x{seq_len}x{hidden_size}",
            hidden_data.len()
        )));
    }

    Ok((0..batch_size)
        .map(|b| {
            let hidden = &hidden_data[b * row_len..(b + 1) * row_len];
            let mask = &attention_mask[b * seq_len..(b + 1) * seq_len];
            l2_normalize(&mean_pooling(hidden, mask, seq_len, hidden_size))
        })
        .collect())
}

/// Mean pooling over hidden states weighted by attention mask.
///
/// `hidden_data` is one row with shape `[seq_len, hidden_size]`.
fn mean_pooling(
    hidden_data: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut result = vec![0.0f32; hidden_size];
    let mut mask_sum: f32 = 0.0;

    for t in 0..seq_len {
        let mask = attention_mask[t] as f32;
        mask_sum += mask;

        for h in 0..hidden_size {
            result[h] += hidden_data[t * hidden_size + h] * mask;
        }
    }

    if mask_sum > 0.0 {
        for v in &mut result {
            *v /= mask_sum;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::l2_norm;

    #[test]
    fn test_mean_pooling_simple() {
        // 1 token, hidden_size=3, all attention=1
        let hidden = vec![1.0, 2.0, 3.0];
        let mask = vec![1i64];
        let result = mean_pooling(&hidden, &mask, 1, 3);
        assert_eq!(result, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mean_pooling_with_padding() {
        // 2 tokens, hidden_size=2, second token is padding (mask=0)
        let hidden = vec![1.0, 2.0, 10.0, 20.0];
        let mask = vec![1i64, 0i64];
        let result = mean_pooling(&hidden, &mask, 2, 2);
        assert_eq!(result, vec![1.0, 2.0]);
    }

    #[test]
    fn test_pool_batch_rows() {
        // 2 rows, seq_len=2, hidden_size=2
        let hidden = vec![3.0, 4.0, 9.0, 9.0, 0.0, 2.0, 0.0, 4.0];
        let mask = vec![1i64, 0, 1, 1];
        let rows = pool_batch(&hidden, &mask, 2, 2, 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert!((rows[0][0] - 0.6).abs() < 1e-6);
        assert!((rows[0][1] - 0.8).abs() < 1e-6);
        assert!((rows[1][1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pool_batch_short_output_is_an_error() {
        // Model answered for one row of a two-row batch.
        let hidden = vec![1.0, 2.0, 3.0, 4.0];
        let mask = vec![1i64, 1, 1, 1];
        let result = pool_batch(&hidden, &mask, 2, 2, 2);
        assert!(matches!(result, Err(EmbedderError::InferenceFailed(_))));
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let result = OnnxEmbedder::new(Path::new("/nonexistent/model"), "multilingual-e5-small", 384);
        assert!(matches!(result, Err(EmbedderError::ModelLoadFailed(_))));
    }

    /// Integration test requiring actual model files.
    #[test]
    #[ignore]
    fn test_onnx_embed() {
        let model_dir = Path::new("models/multilingual-e5-small");
        if !model_dir.join("model.onnx").exists() {
            eprintln!("Skipping: model files not downloaded");
            return;
        }

        let embedder = OnnxEmbedder::new(model_dir, "multilingual-e5-small", 384).unwrap();
        let vec = embedder.embed("Hello, world!").unwrap();

        assert_eq!(vec.len(), 384);
        assert!((l2_norm(&vec) - 1.0).abs() < 0.01);

        let again = embedder.embed("Hello, world!").unwrap();
        let cos: f32 = vec.iter().zip(&again).map(|(a, b)| a * b).sum();
        assert!(cos > 0.9999);
    }

    #[test]
    #[ignore]
    fn test_onnx_batch_matches_single() {
        let model_dir = Path::new("models/multilingual-e5-small");
        if !model_dir.join("model.onnx").exists() {
            return;
        }

        let embedder = OnnxEmbedder::new(model_dir, "multilingual-e5-small", 384).unwrap();
        let batch = embedder
            .embed_batch(&["faith", "patience is a virtue taught again and again"])
            .unwrap();
        let single = embedder.embed("faith").unwrap();
        assert_eq!(batch.len(), 2);
        let cos: f32 = batch[0].iter().zip(&single).map(|(a, b)| a * b).sum();
        assert!(cos > 0.999, "padding must not change the pooled vector");
    }
}

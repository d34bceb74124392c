/// BERT-style tokenizer wrapper around the HuggingFace `tokenizers` crate.
///
/// Produces rectangular id/mask matrices for batched ONNX inference.
use std::path::Path;

use anyhow::Result;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Maximum sequence length accepted by XLM-RoBERTa based encoders.
pub const MAX_SEQ_LEN: usize = 512;

/// Wrapper around the HuggingFace tokenizer for BERT-style models.
pub struct BertTokenizer {
    inner: Tokenizer,
    max_length: usize,
}

/// Output of a tokenization operation for one text.
#[derive(Debug, Clone)]
pub struct TokenizerOutput {
    /// Token IDs (input_ids for the model).
    pub input_ids: Vec<i64>,
    /// Attention mask (1 for real tokens, 0 for padding).
    pub attention_mask: Vec<i64>,
    /// Segment ids; all zero for single-sentence input.
    pub token_type_ids: Vec<i64>,
}

/// A padded batch laid out row-major, ready to become `[batch, seq_len]` tensors.
#[derive(Debug, Clone)]
pub struct TokenizedBatch {
    pub batch_size: usize,
    pub seq_len: usize,
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

impl BertTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file in the model directory.
    pub fn from_model_dir(model_dir: &Path) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {}",
            model_dir.display()
        );

        let mut inner = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        inner
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to configure truncation: {e}"))?;

        // Pad every batch to its longest member
        inner.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            inner,
            max_length: MAX_SEQ_LEN,
        })
    }

    /// Tokenize a single text.
    pub fn tokenize(&self, text: &str) -> Result<TokenizerOutput> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("failed to encode text: {e}"))?;
        Ok(to_output(&encoding))
    }

    /// Tokenize multiple texts into one padded batch.
    pub fn tokenize_batch(&self, texts: &[&str]) -> Result<TokenizedBatch> {
        let encodings = self
            .inner
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("failed to encode batch: {e}"))?;

        let rows: Vec<TokenizerOutput> = encodings.iter().map(to_output).collect();
        stack_rows(&rows)
    }

    /// Get the vocabulary size.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }

    /// Get the configured maximum sequence length.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

fn to_output(enc: &tokenizers::Encoding) -> TokenizerOutput {
    TokenizerOutput {
        input_ids: enc.get_ids().iter().map(|&id| id as i64).collect(),
        attention_mask: enc.get_attention_mask().iter().map(|&m| m as i64).collect(),
        token_type_ids: enc.get_type_ids().iter().map(|&t| t as i64).collect(),
    }
}

/// Flatten equal-length rows into a row-major batch, padding short rows with
/// zeros (id 0, mask 0) if the tokenizer did not.
fn stack_rows(rows: &[TokenizerOutput]) -> Result<TokenizedBatch> {
    let seq_len = rows.iter().map(|r| r.input_ids.len()).max().unwrap_or(0);
    anyhow::ensure!(seq_len > 0, "tokenizer produced an empty batch");

    let mut batch = TokenizedBatch {
        batch_size: rows.len(),
        seq_len,
        input_ids: Vec::with_capacity(rows.len() * seq_len),
        attention_mask: Vec::with_capacity(rows.len() * seq_len),
        token_type_ids: Vec::with_capacity(rows.len() * seq_len),
    };

    for row in rows {
        let pad = seq_len - row.input_ids.len();
        batch.input_ids.extend_from_slice(&row.input_ids);
        batch.input_ids.extend(std::iter::repeat_n(0, pad));
        batch.attention_mask.extend_from_slice(&row.attention_mask);
        batch.attention_mask.extend(std::iter::repeat_n(0, pad));
        batch.token_type_ids.extend_from_slice(&row.token_type_ids);
        batch.token_type_ids.extend(std::iter::repeat_n(0, pad));
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// This test requires the actual tokenizer.json file.
    /// Run with: cargo test tokenizer -- --ignored
    #[test]
    #[ignore]
    fn test_tokenize_with_real_model() {
        let model_dir = Path::new("models/multilingual-e5-small");
        if !model_dir.join("tokenizer.json").exists() {
            eprintln!("Skipping: model files not downloaded");
            return;
        }

        let tokenizer = BertTokenizer::from_model_dir(model_dir).unwrap();
        let output = tokenizer.tokenize("Hello, world!").unwrap();

        assert!(!output.input_ids.is_empty());
        assert_eq!(output.input_ids.len(), output.attention_mask.len());
        // Should have CLS and SEP tokens
        assert!(output.input_ids.len() >= 3);
    }

    #[test]
    #[ignore]
    fn test_tokenize_batch_with_real_model() {
        let model_dir = Path::new("models/multilingual-e5-small");
        if !model_dir.join("tokenizer.json").exists() {
            return;
        }

        let tokenizer = BertTokenizer::from_model_dir(model_dir).unwrap();
        let batch = tokenizer
            .tokenize_batch(&["Hello", "A much longer sentence about devotion", "भक्ति"])
            .unwrap();

        assert_eq!(batch.batch_size, 3);
        assert_eq!(batch.input_ids.len(), 3 * batch.seq_len);
    }

    #[test]
    fn test_tokenizer_missing_file() {
        let result = BertTokenizer::from_model_dir(Path::new("/nonexistent/path"));
        assert!(result.is_err());
    }

    #[test]
    fn test_stack_rows_pads_short_rows() {
        let rows = vec![
            TokenizerOutput {
                input_ids: vec![0, 5, 2],
                attention_mask: vec![1, 1, 1],
                token_type_ids: vec![0, 0, 0],
            },
            TokenizerOutput {
                input_ids: vec![0, 2],
                attention_mask: vec![1, 1],
                token_type_ids: vec![0, 0],
            },
        ];
        let batch = stack_rows(&rows).unwrap();
        assert_eq!(batch.seq_len, 3);
        assert_eq!(batch.input_ids, vec![0, 5, 2, 0, 2, 0]);
        assert_eq!(batch.attention_mask, vec![1, 1, 1, 1, 1, 0]);
    }

    #[test]
    fn test_stack_rows_empty() {
        assert!(stack_rows(&[]).is_err());
    }
}

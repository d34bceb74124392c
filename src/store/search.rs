use std::cmp::Ordering;

use super::{IndexStore, SearchHit, StoreError};
use crate::embedder::l2_normalize;

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Higher score first; equal scores fall back to ordinal position.
fn by_score_then_position(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

impl IndexStore {
    /// Exact top-k search by inner product.
    ///
    /// The query is normalized first, so scores are cosine similarities.
    /// Returns `min(k, len)` hits ordered by descending score.
    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        if k == 0 {
            return Err(StoreError::InvalidK);
        }
        if query_vector.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let query = l2_normalize(query_vector);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimensions)
            .map(|v| dot(&query, v))
            .enumerate()
            .collect();

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_score_then_position);
            scored.truncate(k);
        }
        scored.sort_by(by_score_then_position);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, (position, score))| SearchHit {
                rank: i + 1,
                position,
                record: self.records[position].clone(),
                score,
            })
            .collect())
    }
}

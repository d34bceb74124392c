//! Query-time lookup over a loaded index.
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::embedder::Embedder;
use crate::store::{IndexStore, SearchHit};

/// One ranked passage returned for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    pub text: String,
    pub source: String,
    pub chunk_id: usize,
    pub score: f32,
    /// 1-based position in the result list.
    pub rank: usize,
}

impl From<SearchHit> for RetrievedPassage {
    fn from(hit: SearchHit) -> Self {
        Self {
            text: hit.record.text,
            source: hit.record.source,
            chunk_id: hit.record.chunk_id,
            score: hit.score,
            rank: hit.rank,
        }
    }
}

/// Result of a lookup, distinguishing "nothing to search" from "search broke".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RetrievalOutcome {
    Retrieved(Vec<RetrievedPassage>),
    NoIndex,
    Failed(String),
}

impl RetrievalOutcome {
    /// The passages, or an empty list for any other outcome.
    #[must_use]
    pub fn into_passages(self) -> Vec<RetrievedPassage> {
        match self {
            RetrievalOutcome::Retrieved(passages) => passages,
            RetrievalOutcome::NoIndex | RetrievalOutcome::Failed(_) => Vec::new(),
        }
    }
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Option<Arc<IndexStore>>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Option<Arc<IndexStore>>) -> Self {
        Self { embedder, store }
    }

    #[must_use]
    pub fn store(&self) -> Option<&Arc<IndexStore>> {
        self.store.as_ref()
    }

    /// Top-k passages for `query`; empty when there is no index or the
    /// lookup fails.
    pub fn retrieve(&self, query: &str, k: usize) -> Vec<RetrievedPassage> {
        self.lookup(query, k).into_passages()
    }

    pub fn lookup(&self, query: &str, k: usize) -> RetrievalOutcome {
        let Some(store) = &self.store else {
            debug!("Lookup without an index");
            return RetrievalOutcome::NoIndex;
        };

        if store.model() != self.embedder.model_id() {
            let reason = format!(
                "index was built with model '{}' but the active model is '{}'",
                store.model(),
                self.embedder.model_id()
            );
            error!("Retrieval failed: {reason}");
            return RetrievalOutcome::Failed(reason);
        }

        let query_vector = match self.embedder.embed_query(query) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to embed query: {e}");
                return RetrievalOutcome::Failed(e.to_string());
            }
        };

        match store.search(&query_vector, k) {
            Ok(hits) => {
                debug!("Retrieved {} passages", hits.len());
                RetrievalOutcome::Retrieved(hits.into_iter().map(RetrievedPassage::from).collect())
            }
            Err(e) => {
                error!("Index search failed: {e}");
                RetrievalOutcome::Failed(e.to_string())
            }
        }
    }
}

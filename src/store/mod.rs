//! Flat inner-product vector index with parallel chunk metadata.
//!
//! The store is built once from a full batch of vectors, persisted as two
//! companion files, and is read-only afterwards.
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::embedder::l2_normalize;

pub mod models;
pub mod persist;
pub mod search;

pub use models::{ChunkRecord, SearchHit};

/// File holding the vector matrix.
pub const VECTOR_FILE: &str = "index.vec";
/// File holding the per-chunk metadata list.
pub const META_FILE: &str = "index.meta.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata file {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("{vectors} vectors but {records} metadata records")]
    LengthMismatch { vectors: usize, records: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("k must be a positive integer")]
    InvalidK,

    #[error("cannot build an index from zero vectors")]
    Empty,
}

/// An immutable vector index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    pub(crate) model: String,
    pub(crate) dimensions: usize,
    /// Row-major `len * dimensions` matrix of unit vectors.
    pub(crate) vectors: Vec<f32>,
    pub(crate) records: Vec<ChunkRecord>,
    pub(crate) built_at: DateTime<Utc>,
}

impl IndexStore {
    /// Builds a store from parallel lists of vectors and metadata.
    ///
    /// Vectors are L2-normalized on the way in.
    pub fn build(
        model: &str,
        vectors: Vec<Vec<f32>>,
        records: Vec<ChunkRecord>,
    ) -> Result<Self, StoreError> {
        if vectors.len() != records.len() {
            return Err(StoreError::LengthMismatch {
                vectors: vectors.len(),
                records: records.len(),
            });
        }
        let Some(first) = vectors.first() else {
            return Err(StoreError::Empty);
        };

        let dimensions = first.len();
        if dimensions == 0 {
            return Err(StoreError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let mut flat = Vec::with_capacity(vectors.len() * dimensions);
        for v in &vectors {
            if v.len() != dimensions {
                return Err(StoreError::DimensionMismatch {
                    expected: dimensions,
                    actual: v.len(),
                });
            }
            flat.extend(l2_normalize(v));
        }

        Ok(Self {
            model: model.to_string(),
            dimensions,
            vectors: flat,
            records,
            built_at: Utc::now(),
        })
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embedding model the store was built with.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    #[must_use]
    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    /// The stored vector at an ordinal position.
    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimensions)?;
        self.vectors.get(start..start + self.dimensions)
    }

    /// Whether both artifacts are present in `dir`.
    #[must_use]
    pub fn exists(dir: &Path) -> bool {
        dir.join(VECTOR_FILE).is_file() && dir.join(META_FILE).is_file()
    }

    /// Deletes both artifacts from `dir`, ignoring ones already absent.
    pub fn remove(dir: &Path) -> Result<(), StoreError> {
        for name in [VECTOR_FILE, META_FILE] {
            let path = dir.join(name);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(StoreError::Io { path, source }),
            }
        }
        Ok(())
    }
}

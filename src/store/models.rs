use bytemuck::{Pod, Zeroable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-chunk metadata stored parallel to the vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// File name of the originating document.
    pub source: String,
    /// Position of the chunk within its source.
    pub chunk_id: usize,
    pub text: String,
}

/// One nearest-neighbour result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// 1-based rank within the result list.
    pub rank: usize,
    /// Ordinal position of the vector in the store.
    pub position: usize,
    pub record: ChunkRecord,
    /// Inner product with the query (cosine similarity for unit vectors).
    pub score: f32,
}

/// Fixed header at the start of the vector file. Fields are stored
/// little-endian.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct VectorHeader {
    pub magic: [u8; 8],
    pub version: u32,
    pub dimensions: u32,
    pub count: u64,
    /// Shared with the metadata file so a mismatched pair is detected.
    pub build_id: u64,
}

/// Contents of the metadata file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub build_id: u64,
    pub model: String,
    pub dimensions: usize,
    pub built_at: DateTime<Utc>,
    pub records: Vec<ChunkRecord>,
}

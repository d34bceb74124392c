//! On-disk layout: a binary vector file plus a JSON metadata file, written
//! side by side in one directory.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::models::{IndexMeta, VectorHeader};
use super::{IndexStore, META_FILE, StoreError, VECTOR_FILE};

const MAGIC: [u8; 8] = *b"LRAGVEC1";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = std::mem::size_of::<VectorHeader>();

/// Serialize a float32 slice into little-endian bytes.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn deserialize_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes `bytes` to a temporary sibling and renames it into place.
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl IndexStore {
    fn build_id(&self) -> u64 {
        self.built_at.timestamp_micros().unsigned_abs()
    }

    /// Persists the store into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
        fs::create_dir_all(dir).map_err(io_err(dir))?;

        let header = VectorHeader {
            magic: MAGIC,
            version: FORMAT_VERSION.to_le(),
            dimensions: (self.dimensions as u32).to_le(),
            count: (self.len() as u64).to_le(),
            build_id: self.build_id().to_le(),
        };
        let mut vec_bytes = Vec::with_capacity(HEADER_LEN + self.vectors.len() * 4);
        vec_bytes.extend_from_slice(bytemuck::bytes_of(&header));
        vec_bytes.extend(serialize_vector(&self.vectors));

        let meta = IndexMeta {
            version: FORMAT_VERSION,
            build_id: self.build_id(),
            model: self.model.clone(),
            dimensions: self.dimensions,
            built_at: self.built_at,
            records: self.records.clone(),
        };
        let meta_path = dir.join(META_FILE);
        let meta_bytes = serde_json::to_vec(&meta).map_err(|source| StoreError::Metadata {
            path: meta_path.clone(),
            source,
        })?;

        write_replacing(&dir.join(VECTOR_FILE), &vec_bytes)?;
        write_replacing(&meta_path, &meta_bytes)?;

        info!(
            "Saved index with {} vectors ({} dims) to {}",
            self.len(),
            self.dimensions,
            dir.display()
        );
        Ok(())
    }

    /// Loads a store from `dir`.
    ///
    /// Returns `Ok(None)` when either artifact is missing: no index is an
    /// expected state, not an error.
    pub fn load(dir: &Path) -> Result<Option<Self>, StoreError> {
        let vec_path = dir.join(VECTOR_FILE);
        let meta_path = dir.join(META_FILE);

        if !vec_path.is_file() || !meta_path.is_file() {
            warn!("No index found at {}", dir.display());
            return Ok(None);
        }

        let bytes = fs::read(&vec_path).map_err(io_err(&vec_path))?;
        if bytes.len() < HEADER_LEN {
            return Err(StoreError::Corrupt(format!(
                "{} is shorter than its header",
                vec_path.display()
            )));
        }

        let header: VectorHeader = bytemuck::try_pod_read_unaligned(&bytes[..HEADER_LEN])
            .map_err(|e| StoreError::Corrupt(format!("unreadable header: {e}")))?;
        if header.magic != MAGIC {
            return Err(StoreError::Corrupt("bad magic in vector file".to_string()));
        }
        let version = u32::from_le(header.version);
        if version != FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported format version {version}"
            )));
        }

        let dimensions = u32::from_le(header.dimensions) as usize;
        let count = u64::from_le(header.count) as usize;
        let build_id = u64::from_le(header.build_id);

        let body = &bytes[HEADER_LEN..];
        let expected = count
            .checked_mul(dimensions)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| StoreError::Corrupt("vector count overflows".to_string()))?;
        if body.len() != expected {
            return Err(StoreError::Corrupt(format!(
                "vector file holds {} bytes, header promises {expected}",
                body.len()
            )));
        }

        let meta_bytes = fs::read(&meta_path).map_err(io_err(&meta_path))?;
        let meta: IndexMeta =
            serde_json::from_slice(&meta_bytes).map_err(|source| StoreError::Metadata {
                path: meta_path.clone(),
                source,
            })?;

        if meta.build_id != build_id {
            return Err(StoreError::Corrupt(
                "vector and metadata files come from different builds".to_string(),
            ));
        }
        if meta.dimensions != dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: dimensions,
                actual: meta.dimensions,
            });
        }
        if meta.records.len() != count {
            return Err(StoreError::LengthMismatch {
                vectors: count,
                records: meta.records.len(),
            });
        }
        if count == 0 || dimensions == 0 {
            return Err(StoreError::Corrupt("index is empty".to_string()));
        }

        info!(
            "Loaded index with {count} vectors ({dimensions} dims, model {}) from {}",
            meta.model,
            dir.display()
        );

        Ok(Some(Self {
            model: meta.model,
            dimensions,
            vectors: deserialize_vector(body),
            records: meta.records,
            built_at: meta.built_at,
        }))
    }
}

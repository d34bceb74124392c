use crate::embedder::{Embedder, EmbedderError};
use crate::indexer::chunker::{self, Chunk, ChunkError};
use crate::indexer::extract::{self, DocumentKind};
use crate::store::{ChunkRecord, IndexStore, StoreError};
use ignore::WalkBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("no indexable content found in {0}")]
    NoContent(PathBuf),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error("embedding failed: {0}")]
    Embed(#[from] EmbedderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot read source directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// An index was already present and left as is.
    pub skipped: bool,
    pub files: usize,
    pub failed_files: usize,
    pub chunks: usize,
    pub dimensions: usize,
}

/// Supported documents under `dir`, recursively, sorted by path.
///
/// Hidden files are included and ignore files are not honoured: every
/// document in the corpus directory is part of the corpus.
pub fn discover(dir: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .build();

    let mut files: Vec<PathBuf> = walker
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| DocumentKind::from_path(path).is_some())
        .collect();
    files.sort();
    files
}

pub struct Indexer<'a, E: Embedder + ?Sized> {
    pub embedder: &'a E,
    pub vector_db_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

impl<'a, E: Embedder + ?Sized> Indexer<'a, E> {
    pub fn new(
        embedder: &'a E,
        vector_db_path: impl Into<PathBuf>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            embedder,
            vector_db_path: vector_db_path.into(),
            chunk_size,
            chunk_overlap,
            batch_size: 32,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Builds the vector index for every supported document in `dir`.
    ///
    /// Without `force_rebuild` an existing index is reused untouched. With
    /// it, the old artifacts are deleted and replaced, but only once the
    /// corpus has produced at least one chunk.
    pub fn build_index(&self, dir: &Path, force_rebuild: bool) -> Result<BuildReport, IndexError> {
        if !force_rebuild && IndexStore::exists(&self.vector_db_path) {
            info!(
                "Index already present at {}, skipping build",
                self.vector_db_path.display()
            );
            return Ok(BuildReport {
                skipped: true,
                ..Default::default()
            });
        }

        match std::fs::metadata(dir) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Source directory {} does not exist", dir.display());
                return Err(IndexError::NoContent(dir.to_path_buf()));
            }
            Err(source) => {
                return Err(IndexError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        }

        let mut report = BuildReport::default();
        let mut chunks: Vec<Chunk> = Vec::new();

        for path in discover(dir) {
            report.files += 1;
            let doc = match extract::extract_text(&path) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Failed to extract {}: {e}", path.display());
                    report.failed_files += 1;
                    continue;
                }
            };
            if doc.failed_pages > 0 {
                warn!(
                    "{} page(s) of {} yielded no text",
                    doc.failed_pages,
                    path.display()
                );
            }

            let source_id = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());
            let file_chunks =
                chunker::chunk_document(&source_id, &doc.text, self.chunk_size, self.chunk_overlap)?;
            debug!("{}: {} chunks", path.display(), file_chunks.len());
            chunks.extend(file_chunks);
        }

        if chunks.is_empty() {
            warn!("No chunks produced from {}", dir.display());
            return Err(IndexError::NoContent(dir.to_path_buf()));
        }

        info!(
            "Embedding {} chunks from {} files (batch size {})",
            chunks.len(),
            report.files - report.failed_files,
            self.batch_size
        );
        let vectors = self.embed_chunks(&chunks)?;

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .map(|c| ChunkRecord {
                source: c.source_id,
                chunk_id: c.sequence_index,
                text: c.text,
            })
            .collect();
        let store = IndexStore::build(self.embedder.model_id(), vectors, records)?;

        if force_rebuild {
            info!("Removing previous index at {}", self.vector_db_path.display());
            IndexStore::remove(&self.vector_db_path)?;
        }
        store.save(&self.vector_db_path)?;

        report.chunks = store.len();
        report.dimensions = store.dimensions();
        Ok(report)
    }

    fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        let total_batches = texts.len().div_ceil(self.batch_size);

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            let embedded = self.embedder.embed_passages(batch)?;
            if embedded.len() != batch.len() {
                return Err(EmbedderError::InferenceFailed(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
            debug!("Embedded batch {}/{total_batches}", i + 1);
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_discover_filters_and_sorts() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path();
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("b.txt"), "b").unwrap();
        fs::write(dir.join("a.TXT"), "a").unwrap();
        fs::write(dir.join("sub/c.pdf"), "not really a pdf").unwrap();
        fs::write(dir.join(".hidden.txt"), "hidden").unwrap();
        fs::write(dir.join("notes.md"), "ignored").unwrap();
        fs::write(dir.join(".gitignore"), "b.txt\n").unwrap();

        let found: Vec<String> = discover(dir)
            .iter()
            .map(|p| p.strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(found, vec![".hidden.txt", "a.TXT", "b.txt", "sub/c.pdf"]);
    }

    #[test]
    fn test_build_then_skip() {
        let temp_dir = tempdir().unwrap();
        let data = temp_dir.path().join("data");
        let db = temp_dir.path().join("db");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("one.txt"), "Faith and patience are the two coins.").unwrap();

        let embedder = MockEmbedder::new(16);
        let indexer = Indexer::new(&embedder, &db, 20, 5);

        let first = indexer.build_index(&data, false).unwrap();
        assert!(!first.skipped);
        assert_eq!(first.files, 1);
        assert_eq!(first.failed_files, 0);
        assert_eq!(first.dimensions, 16);
        assert!(first.chunks >= 2);

        let second = indexer.build_index(&data, false).unwrap();
        assert!(second.skipped);
        assert_eq!(second.chunks, 0);
    }

    #[test]
    fn test_records_follow_chunk_order() {
        let temp_dir = tempdir().unwrap();
        let data = temp_dir.path().join("data");
        let db = temp_dir.path().join("db");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("a.txt"), "Devotion is the path of love.").unwrap();
        fs::write(data.join("b.txt"), "Shraddha").unwrap();

        let embedder = MockEmbedder::new(8);
        Indexer::new(&embedder, &db, 20, 5)
            .build_index(&data, false)
            .unwrap();

        let store = IndexStore::load(&db).unwrap().unwrap();
        let ids: Vec<(&str, usize)> = store
            .records()
            .iter()
            .map(|r| (r.source.as_str(), r.chunk_id))
            .collect();
        assert_eq!(ids, vec![("a.txt", 0), ("a.txt", 1), ("b.txt", 0)]);
        assert_eq!(store.records()[0].text, "Devotion is the path");
        assert_eq!(store.model(), crate::embedder::mock::MOCK_MODEL_ID);

        // Each stored vector sits at its chunk's ordinal position.
        for (i, record) in store.records().iter().enumerate() {
            let expected = embedder.embed(&record.text).unwrap();
            let stored = store.vector(i).unwrap();
            for (a, b) in expected.iter().zip(stored) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_batch_size_does_not_change_index() {
        let temp_dir = tempdir().unwrap();
        let data = temp_dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(
            data.join("long.txt"),
            "Sabka malik ek. Love all, serve all. Help ever, hurt never. ".repeat(5),
        )
        .unwrap();

        let embedder = MockEmbedder::new(32);
        let small = temp_dir.path().join("small");
        let large = temp_dir.path().join("large");
        Indexer::new(&embedder, &small, 40, 10)
            .with_batch_size(1)
            .build_index(&data, false)
            .unwrap();
        Indexer::new(&embedder, &large, 40, 10)
            .with_batch_size(64)
            .build_index(&data, false)
            .unwrap();

        let a = IndexStore::load(&small).unwrap().unwrap();
        let b = IndexStore::load(&large).unwrap().unwrap();
        assert_eq!(a.records(), b.records());
        for i in 0..a.len() {
            assert_eq!(a.vector(i), b.vector(i));
        }
    }

    #[test]
    fn test_unreadable_pdf_is_counted_and_skipped() {
        let temp_dir = tempdir().unwrap();
        let data = temp_dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("broken.pdf"), "this is not a pdf").unwrap();
        fs::write(data.join("ok.txt"), "Love all, serve all.").unwrap();

        let embedder = MockEmbedder::new(8);
        let report = Indexer::new(&embedder, temp_dir.path().join("db"), 500, 50)
            .build_index(&data, false)
            .unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.failed_files, 1);
        assert_eq!(report.chunks, 1);
    }

    #[test]
    fn test_no_content_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let data = temp_dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("blank.txt"), "   \n\t ").unwrap();

        let embedder = MockEmbedder::new(8);
        let db = temp_dir.path().join("db");
        let err = Indexer::new(&embedder, &db, 500, 50)
            .build_index(&data, true)
            .unwrap_err();
        assert!(matches!(err, IndexError::NoContent(_)));
        assert!(!IndexStore::exists(&db));
    }

    #[test]
    fn test_missing_source_dir() {
        let temp_dir = tempdir().unwrap();
        let embedder = MockEmbedder::new(8);
        let err = Indexer::new(&embedder, temp_dir.path().join("db"), 500, 50)
            .build_index(&temp_dir.path().join("absent"), false)
            .unwrap_err();
        assert!(matches!(err, IndexError::NoContent(_)));
        assert!(!IndexStore::exists(&temp_dir.path().join("db")));
    }

    #[test]
    fn test_invalid_chunk_settings() {
        let temp_dir = tempdir().unwrap();
        let data = temp_dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("a.txt"), "text").unwrap();

        let embedder = MockEmbedder::new(8);
        let err = Indexer::new(&embedder, temp_dir.path().join("db"), 10, 10)
            .build_index(&data, false)
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::Chunk(ChunkError::InvalidOverlap { .. })
        ));
    }
}

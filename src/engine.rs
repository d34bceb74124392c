//! Serve-time question answering.
//!
//! An [`Engine`] owns the expensive resources (embedder, loaded index) and
//! runs the per-question flow: safety gate, language resolution, retrieval,
//! answer composition and sanitizing. No generative model is involved; the
//! answer is built from the retrieved passages themselves.
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::embedder::Embedder;
use crate::embedder::download;
use crate::embedder::onnx::OnnxEmbedder;
use crate::indexer::{BuildReport, IndexError, Indexer};
use crate::language::{Language, LanguageDetector, ScriptClassifier};
use crate::retriever::{RetrievalOutcome, RetrievedPassage, Retriever};
use crate::safety::{SafetyFilter, TopicCategory};
use crate::store::IndexStore;

/// Separator placed between passages in a composed answer.
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Longest source excerpt returned with an answer, in characters.
const EXCERPT_CHARS: usize = 400;

const EMPTY_QUESTION_MESSAGE: &str = "Question cannot be empty.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    EmptyQuestion,
    Unsafe,
    Answered,
    NoInformation,
    NoIndex,
    RetrievalFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceItem {
    pub excerpt: String,
    pub source: String,
    pub chunk_id: usize,
    pub score: f32,
}

impl From<&RetrievedPassage> for SourceItem {
    fn from(p: &RetrievedPassage) -> Self {
        Self {
            excerpt: excerpt(&p.text),
            source: p.source.clone(),
            chunk_id: p.chunk_id,
            score: p.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub language: Language,
    pub sources: Vec<SourceItem>,
    pub is_safe: bool,
    pub status: AnswerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_category: Option<TopicCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Answer {
    fn plain(answer: &str, language: Language, status: AnswerStatus) -> Self {
        Self {
            answer: answer.to_string(),
            language,
            sources: Vec::new(),
            is_safe: true,
            status,
            safety_category: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub index_present: bool,
    pub vectors: usize,
    pub model: String,
    pub vector_db_path: PathBuf,
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub struct Engine {
    config: Config,
    embedder: Arc<dyn Embedder>,
    detector: LanguageDetector,
    safety: SafetyFilter,
    retriever: Retriever,
}

impl Engine {
    /// Builds an engine around an already loaded embedder.
    ///
    /// A missing index is tolerated: questions are then answered with the
    /// "not available" message until an index is built.
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let db_path = config.vector_db_path();
        let store = match IndexStore::load(&db_path) {
            Ok(Some(store)) => Some(Arc::new(store)),
            Ok(None) => {
                warn!(
                    "No index at {}; run ingestion before asking questions",
                    db_path.display()
                );
                None
            }
            Err(e) => {
                error!("Index at {} is unusable: {e}", db_path.display());
                None
            }
        };

        let classifier = ScriptClassifier::new().context("failed to build language classifier")?;
        let detector = LanguageDetector::new(
            Box::new(classifier),
            config.supported_languages()?,
            config.default_language()?,
        );
        let safety = SafetyFilter::new().context("failed to build safety filter")?;
        let retriever = Retriever::new(embedder.clone(), store);

        Ok(Self {
            config,
            embedder,
            detector,
            safety,
            retriever,
        })
    }

    /// Loads the ONNX embedder named in `config`, downloading the model
    /// first when allowed, then builds the engine.
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = load_embedder(&config)?;
        Self::new(config, embedder)
    }

    /// A fresh engine over the same embedder, re-reading the index from disk.
    pub fn reload(&self) -> Result<Self> {
        Self::new(self.config.clone(), self.embedder.clone())
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    #[must_use]
    pub fn store(&self) -> Option<&Arc<IndexStore>> {
        self.retriever.store()
    }

    /// Runs ingestion with this engine's embedder and settings. The engine
    /// itself keeps serving the index it was built with; call [`reload`]
    /// to pick up the new one.
    ///
    /// [`reload`]: Engine::reload
    pub fn build_index(
        &self,
        source_dir: Option<&Path>,
        force_rebuild: bool,
    ) -> Result<BuildReport, IndexError> {
        let source_dir = source_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.data_folder());
        Indexer::new(
            self.embedder.as_ref(),
            self.config.vector_db_path(),
            self.config.chunk_size,
            self.config.chunk_overlap,
        )
        .with_batch_size(self.config.embed_batch_size)
        .build_index(&source_dir, force_rebuild)
    }

    pub fn search(&self, query: &str, k: usize) -> RetrievalOutcome {
        self.retriever.lookup(query, k)
    }

    /// Answers one question. Never fails: every problem is reported through
    /// the answer's status.
    pub fn ask(&self, question: &str, language: Option<Language>) -> Answer {
        let question = question.trim();
        if question.is_empty() {
            let language = language.unwrap_or_else(|| self.detector.default_language());
            return Answer::plain(EMPTY_QUESTION_MESSAGE, language, AnswerStatus::EmptyQuestion);
        }

        let preview: String = question.chars().take(100).collect();
        info!("Processing question: {preview}");

        let safety_warning = self.safety.check(question);
        let language = language.unwrap_or_else(|| self.detector.detect(question));

        if let Some(warning) = safety_warning {
            warn!("Prohibited topic ({:?}) in question", warning.category);
            return Answer {
                is_safe: false,
                safety_category: Some(warning.category),
                ..Answer::plain(warning.message, language, AnswerStatus::Unsafe)
            };
        }

        info!("Question language: {}", language.name());

        match self.retriever.lookup(question, self.config.top_k) {
            RetrievalOutcome::Retrieved(passages) if !passages.is_empty() => {
                let joined = passages
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join(PASSAGE_SEPARATOR);
                Answer {
                    answer: self.safety.sanitize(&joined),
                    sources: passages.iter().map(SourceItem::from).collect(),
                    ..Answer::plain("", language, AnswerStatus::Answered)
                }
            }
            RetrievalOutcome::Retrieved(_) => {
                warn!("No relevant passages found");
                Answer::plain(
                    language.no_information_message(),
                    language,
                    AnswerStatus::NoInformation,
                )
            }
            RetrievalOutcome::NoIndex => Answer::plain(
                language.no_information_message(),
                language,
                AnswerStatus::NoIndex,
            ),
            RetrievalOutcome::Failed(reason) => Answer {
                error: Some(reason),
                ..Answer::plain(
                    language.no_information_message(),
                    language,
                    AnswerStatus::RetrievalFailed,
                )
            },
        }
    }

    pub fn health(&self) -> Health {
        let store = self.retriever.store();
        Health {
            status: if store.is_some() {
                "healthy"
            } else {
                "vector_db_missing"
            },
            index_present: store.is_some(),
            vectors: store.map_or(0, |s| s.len()),
            model: self.embedder.model_id().to_string(),
            vector_db_path: self.config.vector_db_path(),
        }
    }
}

/// Loads the ONNX embedder named in `config`.
pub fn load_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let model_dir = config.model_dir();
    if !download::all_files_present(&model_dir) {
        if config.model.auto_download {
            download::download_model_files(&model_dir, &config.model.name)
                .context("failed to download model files")?;
        } else {
            warn!(
                "Model files missing in {} and auto_download is off",
                model_dir.display()
            );
        }
    }

    let embedder = OnnxEmbedder::new(&model_dir, &config.model.name, config.model.dimensions)
        .with_context(|| format!("failed to load model from {}", model_dir.display()))?;
    Ok(Arc::new(embedder))
}

/// A process-wide engine slot that is filled at most once.
///
/// Concurrent first callers serialize on the construction lock; later
/// callers take the lock-free path.
pub struct EngineCell {
    engine: OnceLock<Arc<Engine>>,
    init: Mutex<()>,
}

impl Default for EngineCell {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineCell {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            engine: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn get(&self) -> Option<Arc<Engine>> {
        self.engine.get().cloned()
    }

    /// Returns the engine, constructing it with `build` on first use. A
    /// failed construction leaves the cell empty so a later call can retry.
    pub fn get_or_try_init<F>(&self, build: F) -> Result<Arc<Engine>>
    where
        F: FnOnce() -> Result<Engine>,
    {
        if let Some(engine) = self.engine.get() {
            return Ok(engine.clone());
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = self.engine.get() {
            return Ok(engine.clone());
        }

        let engine = Arc::new(build()?);
        Ok(self.engine.get_or_init(|| engine).clone())
    }
}

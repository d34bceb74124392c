/// Configuration module for lingorag.
///
/// Handles loading, validating, and providing default configuration values,
/// with `LINGORAG_*` environment variables layered on top of the JSON file.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::language::Language;

/// Config file used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "lingorag.json";

const ENV_PREFIX: &str = "LINGORAG_";

// ── Default value functions ──────────────────────────────────────────

fn default_data_folder() -> String {
    "./data".to_string()
}

fn default_vector_db_path() -> String {
    "./vector_db".to_string()
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_top_k() -> usize {
    4
}

fn default_embed_batch_size() -> usize {
    32
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_model_name() -> String {
    "multilingual-e5-small".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_model_dir() -> String {
    "models/multilingual-e5-small".to_string()
}

fn default_supported_languages() -> Vec<String> {
    Language::ALL.iter().map(|l| l.code().to_string()).collect()
}

fn default_language_code() -> String {
    Language::English.code().to_string()
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_data_folder")]
    pub data_folder: String,

    #[serde(default = "default_vector_db_path")]
    pub vector_db_path: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub language: LanguageConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Directory holding `model.onnx` and `tokenizer.json`.
    #[serde(default = "default_model_dir")]
    pub dir: String,

    /// Fetch missing model files on startup.
    #[serde(default = "default_true")]
    pub auto_download: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LanguageConfig {
    #[serde(default = "default_supported_languages")]
    pub supported: Vec<String>,

    #[serde(default = "default_language_code")]
    pub default: String,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            data_folder: default_data_folder(),
            vector_db_path: default_vector_db_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            embed_batch_size: default_embed_batch_size(),
            log_level: default_log_level(),
            model: ModelConfig::default(),
            language: LanguageConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            dimensions: default_dimensions(),
            dir: default_model_dir(),
            auto_download: default_true(),
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            supported: default_supported_languages(),
            default: default_language_code(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to [`DEFAULT_CONFIG_PATH`].
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template next to the working directory.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Overlay `LINGORAG_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::vars().filter(|(k, _)| k.starts_with(ENV_PREFIX)),
        );
    }

    /// Overlay `(name, value)` pairs such as `("LINGORAG_TOP_K", "8")`.
    ///
    /// Unknown names and unparsable values are logged and skipped.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if let Err(e) = self.apply_env_var(field, value) {
                warn!("Ignoring {key}: {e}");
            }
        }
    }

    fn apply_env_var(&mut self, field: &str, value: &str) -> Result<()> {
        fn parse_count(value: &str) -> Result<usize> {
            value
                .trim()
                .parse()
                .with_context(|| format!("expected a non-negative integer, got '{value}'"))
        }

        match field {
            "DATA_FOLDER" => self.data_folder = value.to_string(),
            "VECTOR_DB_PATH" => self.vector_db_path = value.to_string(),
            "CHUNK_SIZE" => self.chunk_size = parse_count(value)?,
            "CHUNK_OVERLAP" => self.chunk_overlap = parse_count(value)?,
            "TOP_K" => self.top_k = parse_count(value)?,
            "EMBED_BATCH_SIZE" => self.embed_batch_size = parse_count(value)?,
            "LOG_LEVEL" => self.log_level = value.to_string(),
            "MODEL_NAME" => self.model.name = value.to_string(),
            "MODEL_DIR" => self.model.dir = value.to_string(),
            "DEFAULT_LANGUAGE" => {
                let language: Language = value.parse()?;
                self.language.default = language.code().to_string();
            }
            other => anyhow::bail!("unknown setting {other}"),
        }
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.chunk_overlap < self.chunk_size,
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            self.chunk_overlap,
            self.chunk_size
        );
        anyhow::ensure!(self.top_k > 0, "top_k must be positive");
        anyhow::ensure!(
            self.embed_batch_size > 0,
            "embed_batch_size must be positive"
        );
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );

        let supported = self.supported_languages()?;
        anyhow::ensure!(
            !supported.is_empty(),
            "at least one supported language must be specified"
        );
        let default = self.default_language()?;
        anyhow::ensure!(
            supported.contains(&default),
            "default language {default} is not in the supported set"
        );
        Ok(())
    }

    pub fn supported_languages(&self) -> Result<Vec<Language>> {
        self.language
            .supported
            .iter()
            .map(|code| {
                code.parse::<Language>()
                    .with_context(|| format!("invalid language.supported entry '{code}'"))
            })
            .collect()
    }

    pub fn default_language(&self) -> Result<Language> {
        self.language
            .default
            .parse()
            .with_context(|| format!("invalid language.default '{}'", self.language.default))
    }

    #[must_use]
    pub fn data_folder(&self) -> PathBuf {
        PathBuf::from(&self.data_folder)
    }

    #[must_use]
    pub fn vector_db_path(&self) -> PathBuf {
        PathBuf::from(&self.vector_db_path)
    }

    #[must_use]
    pub fn model_dir(&self) -> PathBuf {
        PathBuf::from(&self.model.dir)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

//! Text extraction for the supported source formats.
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open PDF {path}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("unsupported file type: {0}")]
    Unsupported(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    /// Classifies a path by its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub path: PathBuf,
    pub text: String,
    /// Pages that could not be decoded and contributed no text.
    pub failed_pages: usize,
}

/// Extracts the full text of a supported document.
pub fn extract_text(path: &Path) -> Result<ExtractedDocument, ExtractError> {
    match DocumentKind::from_path(path) {
        Some(DocumentKind::Text) => extract_plain(path),
        Some(DocumentKind::Pdf) => extract_pdf(path),
        None => Err(ExtractError::Unsupported(path.to_path_buf())),
    }
}

fn extract_plain(path: &Path) -> Result<ExtractedDocument, ExtractError> {
    let bytes = fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                "{} is not valid UTF-8, replacing undecodable bytes",
                path.display()
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };

    Ok(ExtractedDocument {
        path: path.to_path_buf(),
        text,
        failed_pages: 0,
    })
}

/// Extracts PDF text page by page, in page order. A page that fails to
/// decode contributes nothing and is logged.
fn extract_pdf(path: &Path) -> Result<ExtractedDocument, ExtractError> {
    let doc = lopdf::Document::load(path).map_err(|e| ExtractError::Pdf {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut pages = Vec::new();
    let mut failed_pages = 0;

    // get_pages is a BTreeMap keyed by page number, so iteration is in page order
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                warn!(
                    "Failed to extract page {page_number} of {}: {e}",
                    path.display()
                );
                failed_pages += 1;
                pages.push(String::new());
            }
        }
    }

    Ok(ExtractedDocument {
        path: path.to_path_buf(),
        text: pages.join("\n"),
        failed_pages,
    })
}

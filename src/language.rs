//! Language detection for the four supported corpus languages.
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LanguageError {
    #[error("no language could be determined")]
    Undetermined,

    #[error("classifier failed: {0}")]
    Classifier(String),

    #[error("unknown language: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "te")]
    Telugu,
    #[serde(rename = "kn")]
    Kannada,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::English,
        Language::Hindi,
        Language::Telugu,
        Language::Kannada,
    ];

    /// ISO 639-1 code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Telugu => "te",
            Language::Kannada => "kn",
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Telugu => "Telugu",
            Language::Kannada => "Kannada",
        }
    }

    /// Answer given when the knowledge base has nothing relevant.
    #[must_use]
    pub fn no_information_message(self) -> &'static str {
        match self {
            Language::English => "This guidance is not available in Sai Baba's teachings.",
            Language::Hindi => "यह मार्गदर्शन साईं बाबा की शिक्षाओं में उपलब्ध नहीं है।",
            Language::Telugu => "ఈ మార్గదర్శకత్వం సాయి బాబా బోధలలో అందుబాటులో లేదు।",
            Language::Kannada => "ಈ ಮಾರ್ಗದರ್ಶನವು ಸಾಯಿಬಾಬಾ ಅವರ ಬೋಧನೆಗಳಲ್ಲಿ ಲಭ್ಯವಿಲ್ಲ.",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = LanguageError;

    /// Accepts a code (`hi`) or an English name (`Hindi`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|l| l.code() == needle || l.name().to_ascii_lowercase() == needle)
            .ok_or_else(|| LanguageError::Unknown(s.to_string()))
    }
}

/// A raw language classifier. Returns an ISO 639-1 code that may lie outside
/// the supported set.
pub trait LanguageClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<String, LanguageError>;
}

/// Classifies text by the Unicode script holding the most letters.
///
/// Latin script is always reported as English, so French or Spanish text
/// reads as `en` rather than falling back to the default language. Other
/// scripts map to the code of their most common language.
pub struct ScriptClassifier {
    pattern: Regex,
}

/// Script capture groups, named by the code each script maps to.
const SCRIPT_GROUPS: &[(&str, &str)] = &[
    ("en", r"\p{Latin}"),
    ("hi", r"\p{Devanagari}"),
    ("te", r"\p{Telugu}"),
    ("kn", r"\p{Kannada}"),
    ("ta", r"\p{Tamil}"),
    ("ml", r"\p{Malayalam}"),
    ("bn", r"\p{Bengali}"),
    ("gu", r"\p{Gujarati}"),
    ("pa", r"\p{Gurmukhi}"),
    ("or", r"\p{Oriya}"),
    ("ar", r"\p{Arabic}"),
    ("ru", r"\p{Cyrillic}"),
    ("el", r"\p{Greek}"),
    ("th", r"\p{Thai}"),
    ("zh", r"\p{Han}"),
    ("ja", r"[\p{Hiragana}\p{Katakana}]"),
    ("ko", r"\p{Hangul}"),
];

impl ScriptClassifier {
    pub fn new() -> Result<Self, LanguageError> {
        let alternation = SCRIPT_GROUPS
            .iter()
            .map(|(code, class)| format!("(?P<{code}>{class})"))
            .collect::<Vec<_>>()
            .join("|");
        let pattern =
            Regex::new(&alternation).map_err(|e| LanguageError::Classifier(e.to_string()))?;
        Ok(Self { pattern })
    }
}

impl LanguageClassifier for ScriptClassifier {
    fn classify(&self, text: &str) -> Result<String, LanguageError> {
        let mut counts = vec![0usize; SCRIPT_GROUPS.len()];

        for caps in self.pattern.captures_iter(text) {
            if let Some(i) = SCRIPT_GROUPS
                .iter()
                .position(|(code, _)| caps.name(code).is_some())
            {
                counts[i] += 1;
            }
        }

        // Earlier groups win ties
        let (best, &count) = counts
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|(_, c)| **c)
            .ok_or(LanguageError::Undetermined)?;
        if count == 0 {
            return Err(LanguageError::Undetermined);
        }
        Ok(SCRIPT_GROUPS[best].0.to_string())
    }
}

/// Detects the language of a question, falling back to a default whenever
/// the classifier fails or reports an unsupported language.
pub struct LanguageDetector {
    classifier: Box<dyn LanguageClassifier>,
    supported: Vec<Language>,
    default: Language,
}

impl LanguageDetector {
    pub fn new(
        classifier: Box<dyn LanguageClassifier>,
        supported: Vec<Language>,
        default: Language,
    ) -> Self {
        Self {
            classifier,
            supported,
            default,
        }
    }

    /// Script-based detector over all four languages, defaulting to English.
    pub fn with_defaults() -> Result<Self, LanguageError> {
        Ok(Self::new(
            Box::new(ScriptClassifier::new()?),
            Language::ALL.to_vec(),
            Language::English,
        ))
    }

    #[must_use]
    pub fn default_language(&self) -> Language {
        self.default
    }

    #[must_use]
    pub fn is_supported(&self, language: Language) -> bool {
        self.supported.contains(&language)
    }

    /// Never fails: blank input, classifier errors and unsupported results
    /// all yield the default language.
    pub fn detect(&self, text: &str) -> Language {
        if text.trim().is_empty() {
            debug!("Empty text provided, using default language");
            return self.default;
        }

        let code = match self.classifier.classify(text) {
            Ok(code) => code,
            Err(e) => {
                warn!("Language detection failed: {e}, using default");
                return self.default;
            }
        };

        match code.parse::<Language>() {
            Ok(lang) if self.is_supported(lang) => {
                debug!("Detected language: {}", lang.name());
                lang
            }
            _ => {
                warn!(
                    "Detected language '{code}' not supported, using default: {}",
                    self.default
                );
                self.default
            }
        }
    }
}

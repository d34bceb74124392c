//! Topic gate in front of retrieval and a sanitizer for outgoing answers.
//!
//! Matching is plain substring containment on the lowercased question. This
//! over-matches ("will" inside "willing", "sue" inside "pursue") and the
//! keyword lists are English only, whatever language the question is in.
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::warn;

const MEDICAL_KEYWORDS: &[&str] = &[
    "disease",
    "cure",
    "medicine",
    "treatment",
    "diagnosis",
    "symptom",
    "cancer",
    "diabetes",
    "covid",
    "illness",
    "drug",
    "prescription",
    "surgery",
    "therapy",
    "medical",
    "health problem",
    "sick",
];

const LEGAL_KEYWORDS: &[&str] = &[
    "lawsuit",
    "legal advice",
    "court",
    "lawyer",
    "attorney",
    "sue",
    "contract",
    "divorce",
    "custody",
    "will",
    "testament",
    "rights",
    "law",
    "illegal",
    "criminal",
];

const PREDICTIVE_KEYWORDS: &[&str] = &[
    "predict",
    "future",
    "will happen",
    "fortune",
    "lottery",
    "winning",
    "stock market",
    "investment",
    "when will",
    "prediction",
    "foretell",
];

const DIVINE_CLAIMS: &[&str] = &[
    "i am god",
    "i am divine",
    "i am sai baba",
    "worship me",
    "i am omnipotent",
    "i am all-knowing",
];

const DIVINE_CLAIM_SUBSTITUTE: &str = "Sai Baba teaches";

const DISCLAIMER: &str = "\n\nNote: This guidance is based on the available teachings. \
    For deeper spiritual understanding, consider studying Sai Baba's original works \
    and seeking guidance from qualified spiritual teachers.";

/// Responses shorter than this (in characters) get the disclaimer.
const MIN_CONFIDENT_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    Medical,
    Legal,
    Predictive,
}

impl TopicCategory {
    /// Categories in the order they are checked.
    pub const ORDERED: [TopicCategory; 3] = [
        TopicCategory::Medical,
        TopicCategory::Legal,
        TopicCategory::Predictive,
    ];

    #[must_use]
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            TopicCategory::Medical => MEDICAL_KEYWORDS,
            TopicCategory::Legal => LEGAL_KEYWORDS,
            TopicCategory::Predictive => PREDICTIVE_KEYWORDS,
        }
    }

    #[must_use]
    pub fn warning(self) -> &'static str {
        match self {
            TopicCategory::Medical => {
                "I cannot provide medical advice. For health concerns, please consult \
                 qualified healthcare professionals. I can only share general spiritual \
                 wisdom from Sai Baba's teachings."
            }
            TopicCategory::Legal => {
                "I cannot provide legal advice. For legal matters, please consult \
                 qualified legal professionals. I can only share spiritual guidance \
                 from Sai Baba's teachings."
            }
            TopicCategory::Predictive => {
                "I cannot predict the future or provide fortune-telling. I can only \
                 share timeless spiritual wisdom from Sai Baba's teachings to help \
                 guide your present journey."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyWarning {
    pub category: TopicCategory,
    pub message: &'static str,
}

pub struct SafetyFilter {
    divine_claims: Vec<Regex>,
}

impl SafetyFilter {
    pub fn new() -> Result<Self, regex::Error> {
        let divine_claims = DIVINE_CLAIMS
            .iter()
            .map(|claim| {
                RegexBuilder::new(&regex::escape(claim))
                    .case_insensitive(true)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { divine_claims })
    }

    /// Returns the warning of the first category with a keyword contained in
    /// the question, or `None` when the question may proceed.
    pub fn check(&self, question: &str) -> Option<SafetyWarning> {
        let lowered = question.to_lowercase();
        TopicCategory::ORDERED
            .into_iter()
            .find(|category| category.keywords().iter().any(|kw| lowered.contains(kw)))
            .map(|category| SafetyWarning {
                category,
                message: category.warning(),
            })
    }

    /// Rewrites divine-claim phrases and appends a disclaimer to responses
    /// that are very short or admit not knowing.
    pub fn sanitize(&self, response: &str) -> String {
        let uncertain = response.to_lowercase().contains("i don't know");
        let mut out = response.to_string();

        for (claim, pattern) in DIVINE_CLAIMS.iter().zip(&self.divine_claims) {
            if pattern.is_match(&out) {
                warn!("Detected divine claim in response: {claim}");
                out = pattern
                    .replace_all(&out, DIVINE_CLAIM_SUBSTITUTE)
                    .into_owned();
            }
        }

        if out.chars().count() < MIN_CONFIDENT_LEN || uncertain {
            out.push_str(DISCLAIMER);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> SafetyFilter {
        SafetyFilter::new().unwrap()
    }

    #[test]
    fn test_medical_question_blocked() {
        let warning = filter().check("Can you cure my diabetes?").unwrap();
        assert_eq!(warning.category, TopicCategory::Medical);
        assert_eq!(warning.message, TopicCategory::Medical.warning());
    }

    #[test]
    fn test_benign_question_passes() {
        assert!(filter().check("What is the purpose of life?").is_none());
    }

    #[test]
    fn test_legal_and_predictive() {
        assert_eq!(
            filter().check("Should I hire a LAWYER?").unwrap().category,
            TopicCategory::Legal
        );
        assert_eq!(
            filter().check("Tell me my fortune").unwrap().category,
            TopicCategory::Predictive
        );
    }

    #[test]
    fn test_first_category_wins() {
        // "medicine" (medical) and "court" (legal) both match; medical is checked first.
        let warning = filter().check("Can a court order medicine?").unwrap();
        assert_eq!(warning.category, TopicCategory::Medical);
    }

    #[test]
    fn test_predictive_phrase_shadowed_by_legal_will() {
        // "when will" is predictive, but the bare legal keyword "will" matches first.
        let warning = filter().check("When will I find peace?").unwrap();
        assert_eq!(warning.category, TopicCategory::Legal);
    }

    #[test]
    fn test_known_limitation_substring_false_positive() {
        // Substring matching flags "willing" through the legal keyword "will".
        let warning = filter().check("Am I willing to serve others?").unwrap();
        assert_eq!(warning.category, TopicCategory::Legal);
        // "pursue" contains "sue".
        assert!(filter().check("How do I pursue devotion?").is_some());
    }

    #[test]
    fn test_known_limitation_english_only() {
        // "बीमारी" means illness but no Hindi keywords exist.
        assert!(filter().check("क्या बाबा मेरी बीमारी ठीक करेंगे?").is_none());
    }

    #[test]
    fn test_sanitize_rewrites_claims_case_insensitively() {
        let response = "Listen, child. I am God and you must Worship Me every day, \
                        for love is the path to the divine within.";
        let out = filter().sanitize(response);
        assert!(!out.to_lowercase().contains("i am god"));
        assert!(!out.to_lowercase().contains("worship me"));
        assert!(out.contains("Sai Baba teaches and you must Sai Baba teaches every day"));
        assert!(!out.contains("Note:"), "long confident answers get no disclaimer");
    }

    #[test]
    fn test_sanitize_short_response_gets_disclaimer() {
        let out = filter().sanitize("Have faith.");
        assert!(out.starts_with("Have faith."));
        assert!(out.ends_with(DISCLAIMER));
    }

    #[test]
    fn test_sanitize_uncertain_response_gets_disclaimer() {
        let long = "I don't know the exact passage, but the teachings speak of patience \
                    and faith as the two coins to offer.";
        assert!(filter().sanitize(long).ends_with(DISCLAIMER));
    }

    #[test]
    fn test_sanitize_passthrough() {
        let response = "Shraddha and saburi, faith and patience, are the two coins the \
                        devotee is asked to offer.";
        assert_eq!(filter().sanitize(response), response);
    }
}

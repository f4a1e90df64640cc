//! Structural signal derivation from normalized sections.
//!
//! The detector walks the cleaned sections once and produces the
//! [`DocumentFeatures`] bundle consumed by the router and context selector.
//! Language identification is a pluggable capability so the core carries no
//! detection dependency of its own.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::context::estimator::estimate_tokens;

use super::cleaner::NormalizedSection;

/// Terms that mark a document as carrying financial signals.
const FINANCE_TERMS: &[&str] = &[
    "revenue",
    "earnings",
    "ebitda",
    "cash flow",
    "dividend",
    "liabilities",
    "assets",
    "operating income",
    "net income",
    "guidance",
];

/// Structural metadata derived from a document, input to routing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFeatures {
    /// Detected language code, when a detector is configured.
    pub language: Option<String>,
    /// Characters across titles and paragraphs.
    pub character_count: usize,
    /// Heuristic token estimate for the whole document.
    pub token_estimate: u32,
    /// Number of sections.
    pub sections: usize,
    /// Whether any section mentions financial terminology.
    pub financial_terms: bool,
}

/// Callback used to identify the document language from its joined text.
pub type LanguageDetector = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Derives [`DocumentFeatures`] from normalized sections.
pub struct StructureDetector {
    finance_terms: HashSet<String>,
    language_detector: Option<LanguageDetector>,
}

impl StructureDetector {
    /// Creates a detector with the built-in finance vocabulary.
    pub fn new() -> Self {
        Self {
            finance_terms: FINANCE_TERMS.iter().map(|t| t.to_string()).collect(),
            language_detector: None,
        }
    }

    /// Replaces the finance vocabulary.
    pub fn with_finance_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.finance_terms = terms
            .into_iter()
            .map(|t| t.as_ref().to_lowercase())
            .collect();
        self
    }

    /// Installs a language detector invoked over the joined document text.
    pub fn with_language_detector(mut self, detector: LanguageDetector) -> Self {
        self.language_detector = Some(detector);
        self
    }

    /// Walks the sections and derives the feature bundle.
    pub fn analyze(&self, sections: &[NormalizedSection]) -> DocumentFeatures {
        let mut aggregated: Vec<&str> = Vec::new();
        let mut contains_finance = false;

        for section in sections {
            if let Some(title) = &section.title {
                aggregated.push(title);
            }
            aggregated.extend(section.paragraphs.iter().map(String::as_str));
            if !contains_finance && self.has_financial_terms(section) {
                contains_finance = true;
            }
        }

        let joined = aggregated.join("\n");
        let language = if joined.is_empty() {
            None
        } else {
            self.language_detector
                .as_ref()
                .and_then(|detect| detect(&joined))
        };

        DocumentFeatures {
            language,
            character_count: joined.chars().count(),
            token_estimate: estimate_tokens(&joined),
            sections: sections.len(),
            financial_terms: contains_finance,
        }
    }

    fn has_financial_terms(&self, section: &NormalizedSection) -> bool {
        let mut haystack = section.title.clone().unwrap_or_default();
        for paragraph in &section.paragraphs {
            haystack.push(' ');
            haystack.push_str(paragraph);
        }
        let haystack = haystack.to_lowercase();
        self.finance_terms.iter().any(|term| haystack.contains(term))
    }
}

impl Default for StructureDetector {
    fn default() -> Self {
        Self::new()
    }
}

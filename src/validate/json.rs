//! JSON extraction from noisy model output.
//!
//! Candidates are gathered in a strict priority order: fenced code blocks
//! first (when any fence exists, only fenced content is considered), then
//! the whole trimmed text when it is brace-delimited, then any greedy
//! `{…}` substring. The first candidate that parses wins.

use regex::Regex;
use thiserror::Error;

use super::ErrorKind;

/// A successfully extracted JSON payload and the raw text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub value: serde_json::Value,
    pub raw: String,
}

/// Raised when no candidate yields valid JSON.
#[derive(Debug, Error)]
#[error("Failed to extract JSON: {kind}")]
pub struct ExtractionError {
    pub kind: ErrorKind,
}

/// Attempts to extract valid JSON even when surrounding noise exists.
pub struct JsonExtractor {
    fence_pattern: Regex,
    object_pattern: Regex,
}

impl JsonExtractor {
    /// Creates an extractor.
    pub fn new() -> Self {
        Self {
            fence_pattern: Regex::new(r"(?si)```(?:json)?(.*?)```").expect("valid fence pattern"),
            object_pattern: Regex::new(r"(?s)\{.*\}").expect("valid object pattern"),
        }
    }

    /// Extracts the first parseable JSON candidate from `text`.
    pub fn extract(&self, text: &str) -> Result<Extraction, ExtractionError> {
        let candidates = self.find_candidates(text);
        let mut first_error: Option<String> = None;

        for raw in candidates {
            match serde_json::from_str(&raw) {
                Ok(value) => return Ok(Extraction { value, raw }),
                Err(err) => {
                    first_error.get_or_insert_with(|| err.to_string());
                }
            }
        }

        let kind = match first_error {
            Some(message) => ErrorKind::DecodeError(message),
            None => ErrorKind::NoJsonCandidate,
        };
        Err(ExtractionError { kind })
    }

    fn find_candidates(&self, text: &str) -> Vec<String> {
        let fenced: Vec<String> = self
            .fence_pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|group| group.as_str().trim().to_string())
            .collect();
        if !fenced.is_empty() {
            return fenced;
        }

        let mut candidates = Vec::new();
        let stripped = text.trim();
        if stripped.starts_with('{') && stripped.ends_with('}') {
            candidates.push(stripped.to_string());
        }

        candidates.extend(
            self.object_pattern
                .find_iter(text)
                .map(|found| found.as_str().to_string()),
        );

        candidates
    }
}

impl Default for JsonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

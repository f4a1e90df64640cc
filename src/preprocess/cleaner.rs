//! Text cleaning helpers that normalize extracted content for LLM use.
//!
//! Upstream extractors (PDF, HTML) hand over loosely structured sections;
//! the cleaner collapses whitespace, strips banned boilerplate phrases and
//! drops paragraphs too short to carry signal, keeping context windows
//! efficient downstream.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A titled group of cleaned paragraphs, the unit of context selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSection {
    /// Section heading, when the extractor recovered one.
    #[serde(default)]
    pub title: Option<String>,
    /// Cleaned paragraphs in document order.
    #[serde(default)]
    pub paragraphs: Vec<String>,
}

impl NormalizedSection {
    /// Creates a section from a title and paragraphs.
    pub fn new(title: Option<&str>, paragraphs: &[&str]) -> Self {
        Self {
            title: title.map(str::to_string),
            paragraphs: paragraphs.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Paragraphs joined with newlines, the text fed to token estimation.
    pub fn body(&self) -> String {
        self.paragraphs.join("\n")
    }
}

/// Cleans extracted sections before feature derivation and selection.
pub struct TextCleaner {
    min_paragraph_length: usize,
    banned_patterns: Vec<Regex>,
}

impl TextCleaner {
    /// Creates a cleaner dropping paragraphs shorter than
    /// `min_paragraph_length` characters after normalization.
    pub fn new(min_paragraph_length: usize) -> Self {
        Self {
            min_paragraph_length,
            banned_patterns: Vec::new(),
        }
    }

    /// Adds phrases removed from every paragraph (case-insensitive).
    pub fn with_banned_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.banned_patterns = phrases
            .into_iter()
            .map(|p| {
                Regex::new(&format!("(?i){}", regex::escape(p.as_ref())))
                    .expect("escaped phrase is a valid pattern")
            })
            .collect();
        self
    }

    /// Normalizes sections, discarding those left without paragraphs.
    pub fn normalize_sections(&self, sections: &[NormalizedSection]) -> Vec<NormalizedSection> {
        let mut normalized = Vec::new();
        for section in sections {
            let clean: Vec<String> = section
                .paragraphs
                .iter()
                .map(|p| self.clean_paragraph(p))
                .filter(|p| p.len() >= self.min_paragraph_length)
                .collect();
            if clean.is_empty() {
                continue;
            }
            normalized.push(NormalizedSection {
                title: section.title.clone(),
                paragraphs: clean,
            });
        }
        normalized
    }

    /// Flattens normalized sections into a single LLM-ready text block.
    pub fn as_llm_ready_text(&self, sections: &[NormalizedSection]) -> String {
        let mut chunks: Vec<String> = Vec::new();
        for section in self.normalize_sections(sections) {
            if let Some(title) = &section.title {
                chunks.push(title.trim().to_string());
            }
            chunks.extend(section.paragraphs);
        }
        chunks.join("\n\n")
    }

    fn clean_paragraph(&self, paragraph: &str) -> String {
        let mut collapsed = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
        for pattern in &self.banned_patterns {
            collapsed = pattern.replace_all(&collapsed, "").into_owned();
        }
        collapsed.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new(25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        let cleaner = TextCleaner::new(5);
        let sections = vec![NormalizedSection::new(
            Some("Title"),
            &["several   words\n\twith  gaps"],
        )];
        let normalized = cleaner.normalize_sections(&sections);
        assert_eq!(normalized[0].paragraphs[0], "several words with gaps");
    }

    #[test]
    fn test_drops_short_paragraphs_and_empty_sections() {
        let cleaner = TextCleaner::new(25);
        let sections = vec![
            NormalizedSection::new(Some("Short"), &["tiny"]),
            NormalizedSection::new(
                Some("Kept"),
                &["this paragraph is comfortably long enough to survive"],
            ),
        ];
        let normalized = cleaner.normalize_sections(&sections);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].title.as_deref(), Some("Kept"));
    }

    #[test]
    fn test_banned_phrases_removed() {
        let cleaner = TextCleaner::new(5).with_banned_phrases(["CONFIDENTIAL"]);
        let sections = vec![NormalizedSection::new(
            None,
            &["confidential revenue grew twelve percent"],
        )];
        let normalized = cleaner.normalize_sections(&sections);
        assert_eq!(normalized[0].paragraphs[0], "revenue grew twelve percent");
    }

    #[test]
    fn test_llm_ready_text_includes_titles() {
        let cleaner = TextCleaner::new(5);
        let sections = vec![NormalizedSection::new(
            Some("Overview"),
            &["the quarter closed strongly"],
        )];
        let text = cleaner.as_llm_ready_text(&sections);
        assert!(text.starts_with("Overview"));
        assert!(text.contains("the quarter closed strongly"));
    }
}

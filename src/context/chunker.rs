//! Token-aware chunking of raw text and section lists.

use serde::{Deserialize, Serialize};

use crate::preprocess::NormalizedSection;

use super::estimator::estimate_tokens;

/// A contiguous slice of document text sized for one model invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub section_title: Option<String>,
    pub token_estimate: u32,
}

/// Splits documents into token-aware chunks.
pub struct Chunker {
    max_tokens: u32,
    overlap_tokens: u32,
}

impl Chunker {
    /// Creates a chunker with explicit window and overlap sizes.
    pub fn new(max_tokens: u32, overlap_tokens: u32) -> Self {
        Self {
            max_tokens,
            overlap_tokens,
        }
    }

    /// Fixed-window split over raw text, overlapping consecutive chunks.
    pub fn chunk_text(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let length = chars.len();
        let window = (self.max_tokens as usize) * 4;
        let overlap = (self.overlap_tokens as usize) * 4;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < length {
            let end = length.min(start + window);
            let chunk_text: String = chars[start..end].iter().collect();
            let token_estimate = estimate_tokens(&chunk_text);
            chunks.push(Chunk {
                text: chunk_text,
                start_offset: start,
                end_offset: end,
                section_title: None,
                token_estimate,
            });
            if end == length {
                break;
            }
            start = end.saturating_sub(overlap).max(start + 1);
        }

        chunks
    }

    /// Greedy paragraph accumulation per section, flushed at the token cap.
    pub fn chunk_sections(&self, sections: &[NormalizedSection]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut offset = 0;

        for section in sections {
            let mut buffer: Vec<&str> = Vec::new();
            for paragraph in &section.paragraphs {
                buffer.push(paragraph);
                let joined = buffer.join("\n");
                if estimate_tokens(&joined) >= self.max_tokens {
                    offset = Self::push_chunk(&mut chunks, &joined, offset, section.title.as_deref());
                    buffer.clear();
                }
            }
            if !buffer.is_empty() {
                let joined = buffer.join("\n");
                offset = Self::push_chunk(&mut chunks, &joined, offset, section.title.as_deref());
            }
        }

        chunks
    }

    fn push_chunk(
        chunks: &mut Vec<Chunk>,
        text: &str,
        offset: usize,
        section_title: Option<&str>,
    ) -> usize {
        let length = text.chars().count();
        chunks.push(Chunk {
            text: text.to_string(),
            start_offset: offset,
            end_offset: offset + length,
            section_title: section_title.map(str::to_string),
            token_estimate: estimate_tokens(text),
        });
        offset + length
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(512, 64)
    }
}

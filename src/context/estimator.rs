//! Heuristic token estimation for context planning.
//!
//! Every budget check, batching cap and context selection in the system is
//! denominated in this estimate, so all components must agree on it
//! bit-for-bit. The heuristic assumes roughly four characters per token.

use serde::{Deserialize, Serialize};

/// Estimate the token count of a text fragment.
///
/// Whitespace-only input estimates to zero; any other input estimates to at
/// least one token.
pub fn estimate_tokens(text: &str) -> u32 {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return 0;
    }
    ((cleaned.chars().count() / 4) as u32).max(1)
}

/// Aggregate token estimates for multiple fragments.
pub fn estimate_tokens_for_fragments<'a, I>(fragments: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    fragments.into_iter().map(estimate_tokens).sum()
}

/// Tracks estimated token usage for inputs and outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStats {
    /// Estimated tokens consumed by the prompt.
    pub input_tokens: u32,
    /// Estimated tokens produced by the model.
    pub output_tokens: u32,
}

impl TokenStats {
    /// Creates stats from explicit input and output counts.
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens across input and output.
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Adds the estimate for a prompt fragment to the input side.
    pub fn add_input(&mut self, text: &str) {
        self.input_tokens += estimate_tokens(text);
    }

    /// Adds the estimate for a completion fragment to the output side.
    pub fn add_output(&mut self, text: &str) {
        self.output_tokens += estimate_tokens(text);
    }
}

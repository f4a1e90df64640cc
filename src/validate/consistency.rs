//! Consistency checks between input context and model output.

use serde::{Deserialize, Serialize};

/// Collapses whitespace and lowercases for tolerant substring matching.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One named consistency signal with its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencySignal {
    pub name: String,
    pub passed: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub reason: String,
}

/// Combined verdict over all signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyResult {
    pub passed: bool,
    pub signals: Vec<ConsistencySignal>,
}

impl ConsistencyResult {
    /// Reasons of the failing signals.
    pub fn failure_reasons(&self) -> Vec<&str> {
        self.signals
            .iter()
            .filter(|signal| !signal.passed)
            .map(|signal| signal.reason.as_str())
            .collect()
    }
}

/// Heuristics judging whether output aligns with its input context.
#[derive(Debug, Default)]
pub struct ConsistencyChecker {
    min_overlap: usize,
}

impl ConsistencyChecker {
    /// Creates a checker requiring at least one keyword overlap.
    pub fn new() -> Self {
        Self { min_overlap: 1 }
    }

    /// Overrides the keyword overlap threshold.
    pub fn with_min_overlap(mut self, min_overlap: usize) -> Self {
        self.min_overlap = min_overlap;
        self
    }

    /// Requires every entity to appear in the normalized context.
    pub fn check_entities(&self, context: &str, entities: &[String]) -> ConsistencySignal {
        let normalized_context = normalize(context);
        let missing: Vec<&str> = entities
            .iter()
            .filter(|entity| !normalized_context.contains(&normalize(entity)))
            .map(String::as_str)
            .collect();

        let passed = missing.is_empty();
        let reason = if passed {
            "All required entities found in context".to_string()
        } else {
            format!("Missing entities: {}", missing.join(", "))
        };
        let total = entities.len().max(1);
        let confidence = if passed {
            1.0
        } else {
            (1.0 - missing.len() as f64 / total as f64).max(0.1)
        };

        ConsistencySignal {
            name: "required_entities".to_string(),
            passed,
            confidence,
            reason,
        }
    }

    /// Counts keywords present in the normalized context against the
    /// overlap threshold.
    pub fn check_keywords(&self, context: &str, keywords: &[String]) -> ConsistencySignal {
        let normalized_context = normalize(context);
        let overlap = keywords
            .iter()
            .filter(|keyword| normalized_context.contains(&normalize(keyword)))
            .count();

        let passed = overlap >= self.min_overlap;
        let reason = if passed {
            format!("Overlap count {overlap} meets threshold {}", self.min_overlap)
        } else {
            format!("Overlap {overlap} below threshold {}", self.min_overlap)
        };
        let confidence = (overlap as f64 / self.min_overlap.max(1) as f64).min(1.0);

        ConsistencySignal {
            name: "keyword_overlap".to_string(),
            passed,
            confidence,
            reason,
        }
    }

    /// Runs both signals and combines them with logical AND.
    pub fn evaluate(
        &self,
        context: &str,
        required_entities: &[String],
        keywords: &[String],
    ) -> ConsistencyResult {
        let signals = vec![
            self.check_entities(context, required_entities),
            self.check_keywords(context, keywords),
        ];
        ConsistencyResult {
            passed: signals.iter().all(|signal| signal.passed),
            signals,
        }
    }
}

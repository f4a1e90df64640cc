//! Input types for routing decisions.

use serde::{Deserialize, Serialize};

use crate::preprocess::DocumentFeatures;
use crate::profiles::ModelProfile;

/// Canonical task identifiers for routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Classification,
    Extraction,
    Summarization,
    Rag,
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::Extraction
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Classification => write!(f, "classification"),
            TaskType::Extraction => write!(f, "extraction"),
            TaskType::Summarization => write!(f, "summarization"),
            TaskType::Rag => write!(f, "rag"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "classification" => Ok(TaskType::Classification),
            "extraction" => Ok(TaskType::Extraction),
            "summarization" => Ok(TaskType::Summarization),
            "rag" => Ok(TaskType::Rag),
            other => Err(format!(
                "unknown task type '{other}' (expected classification, extraction, summarization or rag)"
            )),
        }
    }
}

/// Optional constraints such as latency budgets or token caps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Upper bound on expected latency, when the caller has one.
    #[serde(default)]
    pub max_latency_ms: Option<f64>,
    /// Upper bound on total tokens.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Named hardware slot the task must land on.
    #[serde(default)]
    pub hardware_slot: Option<String>,
}

/// Candidate model enriched with profiling data.
///
/// Candidates are immutable inputs; the router records its per-candidate
/// reasoning in a parallel verdict table rather than mutating candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateModel {
    pub model_id: String,
    /// Benchmark-derived profile, when one exists for this model.
    #[serde(default)]
    pub profile: Option<ModelProfile>,
    #[serde(default)]
    pub expected_latency_ms: Option<f64>,
    #[serde(default)]
    pub expected_tokens: Option<u32>,
    #[serde(default)]
    pub failure_rate: Option<f64>,
}

impl CandidateModel {
    /// Creates a bare candidate with no profiling data.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Self::default()
        }
    }

    /// Attaches a benchmark profile.
    pub fn with_profile(mut self, profile: ModelProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Sets the expected latency.
    pub fn with_expected_latency_ms(mut self, latency_ms: f64) -> Self {
        self.expected_latency_ms = Some(latency_ms);
        self
    }

    /// Sets the expected token throughput.
    pub fn with_expected_tokens(mut self, tokens: u32) -> Self {
        self.expected_tokens = Some(tokens);
        self
    }

    /// Sets the observed failure rate.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = Some(rate);
        self
    }
}

/// Complete input bundle that feeds routing logic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterInputs {
    pub document_features: DocumentFeatures,
    pub task_type: TaskType,
    pub candidate_models: Vec<CandidateModel>,
    #[serde(default)]
    pub constraints: Constraints,
}

impl RouterInputs {
    /// Identifiers of all candidates, in input order.
    pub fn candidate_ids(&self) -> Vec<&str> {
        self.candidate_models
            .iter()
            .map(|c| c.model_id.as_str())
            .collect()
    }
}

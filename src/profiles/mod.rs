//! Benchmark-derived model profiles.
//!
//! Profiles summarize replayable benchmark evidence into per-(model, task)
//! latency, token-capacity and error-rate figures. A profile with zero
//! samples is "no evidence" and all its fields are zero.

pub mod aggregator;
pub mod bench;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::router::TaskType;

pub use aggregator::ProfileAggregator;
pub use bench::{BenchmarkRequest, BenchmarkResult, BenchmarkRunner, ModelEndpoint, ResultWriter};

/// Aggregated evidence for one (model, task) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProfile {
    /// Mean wall-clock latency in milliseconds.
    pub latency_ms: f64,
    /// Mean total tokens (input + output) per invocation.
    pub tokens: f64,
    /// Fraction of invocations that errored.
    pub error_rate: f64,
    /// Number of benchmark samples behind the means.
    pub samples: usize,
}

impl TaskProfile {
    /// Creates a profile from explicit figures.
    pub fn new(latency_ms: f64, tokens: f64, error_rate: f64, samples: usize) -> Self {
        Self {
            latency_ms,
            tokens,
            error_rate,
            samples,
        }
    }

    /// Whether the profile carries any benchmark evidence.
    pub fn has_evidence(&self) -> bool {
        self.samples > 0
    }
}

/// All task profiles known for one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub model_id: String,
    #[serde(default)]
    pub tasks: HashMap<TaskType, TaskProfile>,
}

impl ModelProfile {
    /// Creates an empty profile for a model.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            tasks: HashMap::new(),
        }
    }

    /// Adds (or replaces) the profile for a task.
    pub fn with_task(mut self, task_type: TaskType, profile: TaskProfile) -> Self {
        self.tasks.insert(task_type, profile);
        self
    }

    /// Looks up the profile for a task.
    pub fn task(&self, task_type: TaskType) -> Option<&TaskProfile> {
        self.tasks.get(&task_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample_profile_is_no_evidence() {
        let profile = TaskProfile::default();
        assert!(!profile.has_evidence());
        assert_eq!(profile.latency_ms, 0.0);
        assert_eq!(profile.tokens, 0.0);
        assert_eq!(profile.error_rate, 0.0);
    }

    #[test]
    fn test_model_profile_lookup() {
        let profile = ModelProfile::new("local-llm-small")
            .with_task(TaskType::Extraction, TaskProfile::new(2300.0, 9200.0, 0.05, 4));
        assert!(profile.task(TaskType::Extraction).is_some());
        assert!(profile.task(TaskType::Classification).is_none());
    }

    #[test]
    fn test_profile_serde_round_trip() {
        let profile = ModelProfile::new("m")
            .with_task(TaskType::Rag, TaskProfile::new(100.0, 2000.0, 0.1, 10));
        let json = serde_json::to_string(&profile).expect("serializes");
        let parsed: ModelProfile = serde_json::from_str(&json).expect("parses");
        assert_eq!(parsed, profile);
    }
}

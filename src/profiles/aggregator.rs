//! Aggregation of benchmark results into per-model profiles.

use std::collections::HashMap;

use crate::router::TaskType;

use super::bench::BenchmarkResult;
use super::{ModelProfile, TaskProfile};

/// Combines benchmark outputs into aggregated model profiles.
///
/// Aggregation is pure: the store is rebuilt from any replayable result
/// stream and the same inputs always yield the same profiles.
#[derive(Debug, Default)]
pub struct ProfileAggregator;

impl ProfileAggregator {
    /// Creates an aggregator.
    pub fn new() -> Self {
        Self
    }

    /// Groups results by (model, task) and summarizes each group.
    pub fn aggregate(&self, results: &[BenchmarkResult]) -> HashMap<String, ModelProfile> {
        let mut stats: HashMap<(String, TaskType), Vec<&BenchmarkResult>> = HashMap::new();
        for result in results {
            stats
                .entry((result.model_id.clone(), result.task_type))
                .or_default()
                .push(result);
        }

        let mut grouped: HashMap<String, ModelProfile> = HashMap::new();
        for ((model_id, task_type), task_results) in stats {
            let profile = grouped
                .entry(model_id.clone())
                .or_insert_with(|| ModelProfile::new(model_id));
            profile.tasks.insert(task_type, Self::summarize(&task_results));
        }
        grouped
    }

    fn summarize(results: &[&BenchmarkResult]) -> TaskProfile {
        let samples = results.len();
        if samples == 0 {
            return TaskProfile::default();
        }

        let total_latency: f64 = results.iter().map(|r| r.duration_ms()).sum();
        let total_tokens: u64 = results
            .iter()
            .map(|r| u64::from(r.input_tokens) + u64::from(r.output_tokens))
            .sum();
        let error_count = results.iter().filter(|r| r.error.is_some()).count();

        TaskProfile {
            latency_ms: total_latency / samples as f64,
            tokens: total_tokens as f64 / samples as f64,
            error_rate: error_count as f64 / samples as f64,
            samples,
        }
    }
}

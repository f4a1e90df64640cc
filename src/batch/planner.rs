//! Adaptive batch planning under model, token and GPU memory constraints.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::gpu::{GpuProbe, NullProbe};
use super::task::LlmTask;

/// Token floor the adaptive downsizing never goes below.
const MIN_TOKENS_PER_BATCH: u32 = 512;

/// A sealed batch of same-model tasks ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub model_id: String,
    pub tasks: Vec<LlmTask>,
    /// Sum of the included tasks' token estimates.
    pub total_tokens: u32,
    pub reason: String,
}

impl BatchPlan {
    /// Builds a plan, deriving `total_tokens` from the tasks.
    pub fn new(model_id: impl Into<String>, tasks: Vec<LlmTask>, reason: impl Into<String>) -> Self {
        let total_tokens = tasks.iter().map(|t| t.token_estimate).sum();
        Self {
            model_id: model_id.into(),
            tasks,
            total_tokens,
            reason: reason.into(),
        }
    }

    /// Number of tasks in the batch.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the batch holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Creates adaptive batches taking GPU status and token limits into account.
pub struct BatchPlanner {
    gpu_probe: Arc<dyn GpuProbe>,
}

impl BatchPlanner {
    /// Creates a planner that never downsizes (no GPU information).
    pub fn new() -> Self {
        Self {
            gpu_probe: Arc::new(NullProbe),
        }
    }

    /// Creates a planner consulting the given probe before each planning call.
    pub fn with_gpu_probe(gpu_probe: Arc<dyn GpuProbe>) -> Self {
        Self { gpu_probe }
    }

    /// Plans batches from a task snapshot.
    ///
    /// When the first reported GPU has less than `min_free_memory_mb` free,
    /// both caps are halved for this call (floors: one task, 512 tokens).
    /// Within each model group, tasks are packed longest-first.
    pub async fn plan(
        &self,
        tasks: Vec<LlmTask>,
        mut max_batch_size: usize,
        mut max_tokens_per_batch: u32,
        min_free_memory_mb: u64,
    ) -> Vec<BatchPlan> {
        let gpu_status = self.gpu_probe.sample().await;
        if let Some(first) = gpu_status.first() {
            if first.free_memory_mb < min_free_memory_mb {
                max_batch_size = (max_batch_size / 2).max(1);
                max_tokens_per_batch = (max_tokens_per_batch / 2).max(MIN_TOKENS_PER_BATCH);
                debug!(
                    free_mb = first.free_memory_mb,
                    max_batch_size,
                    max_tokens_per_batch,
                    "low GPU memory, halving batch caps"
                );
            }
        }

        let mut plans = Vec::new();
        for (model_id, mut bucket) in Self::group_by_model(tasks) {
            bucket.sort_by(|a, b| b.token_estimate.cmp(&a.token_estimate));

            let mut current: Vec<LlmTask> = Vec::new();
            let mut token_count: u32 = 0;

            for task in bucket {
                if current.len() >= max_batch_size
                    || token_count + task.token_estimate > max_tokens_per_batch
                {
                    if !current.is_empty() {
                        plans.push(BatchPlan::new(
                            model_id.clone(),
                            std::mem::take(&mut current),
                            "Batch closed due to size or token limit",
                        ));
                    }
                    token_count = 0;
                }
                token_count += task.token_estimate;
                current.push(task);
            }

            if !current.is_empty() {
                plans.push(BatchPlan::new(model_id, current, "Batch finalization"));
            }
        }

        plans
    }

    fn group_by_model(tasks: Vec<LlmTask>) -> Vec<(String, Vec<LlmTask>)> {
        let mut grouped: Vec<(String, Vec<LlmTask>)> = Vec::new();
        for task in tasks {
            let key = task.effective_model().to_string();
            match grouped.iter_mut().find(|(model, _)| *model == key) {
                Some((_, bucket)) => bucket.push(task),
                None => grouped.push((key, vec![task])),
            }
        }
        grouped
    }
}

impl Default for BatchPlanner {
    fn default() -> Self {
        Self::new()
    }
}

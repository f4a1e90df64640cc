//! Batch execution with out-of-memory splitting.
//!
//! The executor drives an opaque inference backend over sealed plans. Every
//! invocation is bounded by a wall-clock timeout; a timeout is surfaced as an
//! ordinary inference failure. Failures whose message mentions OOM split the
//! plan at the midpoint and retry both halves in the same pass; anything else
//! hands the plan's tasks to the optional fallback sink.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::planner::BatchPlan;
use super::task::LlmTask;

/// Errors raised by an inference backend.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The backend reported a failure.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// The invocation exceeded its wall-clock budget.
    #[error("Inference timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of one execution attempt for one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub plan: BatchPlan,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl BatchResult {
    fn success(plan: BatchPlan) -> Self {
        Self {
            plan,
            success: true,
            error: None,
        }
    }

    fn failure(plan: BatchPlan, error: impl Into<String>) -> Self {
        Self {
            plan,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Opaque inference backend executing one plan at a time.
#[async_trait]
pub trait BatchInference: Send + Sync {
    /// Runs the whole plan, raising on transport or model failure.
    async fn infer(&self, plan: &BatchPlan) -> Result<(), ExecutionError>;
}

/// Sink receiving the tasks of a plan that failed without an OOM signal.
pub type FallbackSink = Box<dyn Fn(&[LlmTask]) + Send + Sync>;

/// Executes planned batches and applies fallback strategies upon failure.
pub struct BatchExecutor {
    inference: Arc<dyn BatchInference>,
    fallback: Option<FallbackSink>,
    timeout: Duration,
}

impl BatchExecutor {
    /// Creates an executor with the default 120 second invocation timeout.
    pub fn new(inference: Arc<dyn BatchInference>) -> Self {
        Self {
            inference,
            fallback: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Installs the task-level fallback sink.
    pub fn with_fallback(mut self, fallback: FallbackSink) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Overrides the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executes each plan, emitting one result per attempt (including the
    /// attempts of OOM split halves).
    pub async fn execute(&self, plans: Vec<BatchPlan>) -> Vec<BatchResult> {
        let mut results = Vec::new();

        for plan in plans {
            let mut pending = VecDeque::from([plan]);
            while let Some(plan) = pending.pop_front() {
                match self.run_plan(&plan).await {
                    Ok(()) => results.push(BatchResult::success(plan)),
                    Err(err) => {
                        let message = err.to_string();
                        warn!(model = %plan.model_id, error = %message, "batch failed");

                        let is_oom = message.to_uppercase().contains("OOM");
                        if is_oom && plan.tasks.len() > 1 {
                            let (part_a, part_b) = Self::split_plan(&plan);
                            results.push(BatchResult::failure(plan, &message));
                            pending.push_front(part_b);
                            pending.push_front(part_a);
                        } else {
                            if !is_oom {
                                if let Some(sink) = &self.fallback {
                                    sink(&plan.tasks);
                                }
                            }
                            results.push(BatchResult::failure(plan, &message));
                        }
                    }
                }
            }
        }

        results
    }

    async fn run_plan(&self, plan: &BatchPlan) -> Result<(), ExecutionError> {
        tokio::time::timeout(self.timeout, self.inference.infer(plan))
            .await
            .map_err(|_| ExecutionError::Timeout(self.timeout))?
    }

    fn split_plan(plan: &BatchPlan) -> (BatchPlan, BatchPlan) {
        let mid = plan.tasks.len() / 2;
        let part_a = BatchPlan::new(
            plan.model_id.clone(),
            plan.tasks[..mid].to_vec(),
            "Fallback split part A",
        );
        let part_b = BatchPlan::new(
            plan.model_id.clone(),
            plan.tasks[mid..].to_vec(),
            "Fallback split part B",
        );
        (part_a, part_b)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::router::TaskType;

    fn task(id: &str, tokens: u32) -> LlmTask {
        LlmTask::new(0, id, "doc", TaskType::Extraction, tokens).with_target_model("m")
    }

    fn plan(tasks: Vec<LlmTask>) -> BatchPlan {
        BatchPlan::new("m", tasks, "Batch finalization")
    }

    /// Backend scripted to fail while plans are larger than a threshold.
    struct ThresholdBackend {
        fail_above: usize,
        message: String,
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl BatchInference for ThresholdBackend {
        async fn infer(&self, plan: &BatchPlan) -> Result<(), ExecutionError> {
            self.calls.lock().expect("lock poisoned").push(plan.tasks.len());
            if plan.tasks.len() > self.fail_above {
                Err(ExecutionError::Inference(self.message.clone()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_successful_plan_reports_success() {
        let backend = Arc::new(ThresholdBackend {
            fail_above: 100,
            message: String::new(),
            calls: Mutex::new(Vec::new()),
        });
        let executor = BatchExecutor::new(backend);
        let results = executor.execute(vec![plan(vec![task("a", 10)])]).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert!(results[0].error.is_none());
    }

    #[tokio::test]
    async fn test_oom_splits_until_batches_fit() {
        let backend = Arc::new(ThresholdBackend {
            fail_above: 1,
            message: "CUDA error: OOM while allocating tensor".to_string(),
            calls: Mutex::new(Vec::new()),
        });
        let executor = BatchExecutor::new(backend);
        let results = executor
            .execute(vec![plan(vec![
                task("a", 10),
                task("b", 10),
                task("c", 10),
                task("d", 10),
            ])])
            .await;

        // One failure for the 4-task plan, one per failing 2-task half,
        // then four single-task successes.
        let failures: Vec<&BatchResult> = results.iter().filter(|r| !r.success).collect();
        let successes: Vec<&BatchResult> = results.iter().filter(|r| r.success).collect();
        assert_eq!(failures.len(), 3);
        assert_eq!(successes.len(), 4);
        assert!(successes.iter().all(|r| r.plan.tasks.len() == 1));
        assert!(successes
            .iter()
            .all(|r| r.plan.reason.starts_with("Fallback split part")));
    }

    #[tokio::test]
    async fn test_single_task_oom_is_terminal() {
        let backend = Arc::new(ThresholdBackend {
            fail_above: 0,
            message: "oom".to_string(),
            calls: Mutex::new(Vec::new()),
        });
        let executor = BatchExecutor::new(backend);
        let results = executor.execute(vec![plan(vec![task("only", 10)])]).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
    }

    #[tokio::test]
    async fn test_non_oom_failure_invokes_fallback_sink() {
        let backend = Arc::new(ThresholdBackend {
            fail_above: 0,
            message: "connection reset by peer".to_string(),
            calls: Mutex::new(Vec::new()),
        });
        let captured: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_capture = Arc::clone(&captured);
        let executor = BatchExecutor::new(backend).with_fallback(Box::new(move |tasks| {
            let mut captured = sink_capture.lock().expect("lock poisoned");
            captured.extend(tasks.iter().map(|t| t.task_id.clone()));
        }));

        let results = executor
            .execute(vec![plan(vec![task("x", 10), task("y", 10)])])
            .await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(
            *captured.lock().expect("lock poisoned"),
            vec!["x".to_string(), "y".to_string()]
        );
    }

    struct SlowBackend;

    #[async_trait]
    impl BatchInference for SlowBackend {
        async fn infer(&self, _plan: &BatchPlan) -> Result<(), ExecutionError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_timeout_is_an_ordinary_failure() {
        let executor =
            BatchExecutor::new(Arc::new(SlowBackend)).with_timeout(Duration::from_millis(20));
        let results = executor.execute(vec![plan(vec![task("slow", 10)])]).await;
        assert!(!results[0].success);
        assert!(results[0]
            .error
            .as_deref()
            .expect("error recorded")
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_split_preserves_task_order_and_tokens() {
        let original = plan(vec![task("a", 1), task("b", 2), task("c", 3)]);
        let (part_a, part_b) = BatchExecutor::split_plan(&original);
        assert_eq!(part_a.tasks.len(), 1);
        assert_eq!(part_b.tasks.len(), 2);
        assert_eq!(part_a.total_tokens, 1);
        assert_eq!(part_b.total_tokens, 5);
        assert_eq!(part_a.reason, "Fallback split part A");
        assert_eq!(part_b.reason, "Fallback split part B");
    }
}

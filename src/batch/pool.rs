//! Worker pool executing batch plans concurrently.
//!
//! A fixed number of async workers pull sealed plans from a shared channel
//! and run them through a [`BatchExecutor`]; within one worker a plan (and
//! its OOM splits) executes serially. Across workers no ordering is
//! guaranteed. Shutdown is signalled over a broadcast channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::executor::{BatchExecutor, BatchResult};
use super::planner::BatchPlan;

/// Errors that can occur in the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Pool has no workers configured")]
    NoWorkers,
}

/// Configuration for the executor pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker tasks to spawn.
    pub num_workers: usize,
    /// Capacity of the inbound plan channel.
    pub queue_depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            queue_depth: 64,
        }
    }
}

/// Counters shared between workers.
#[derive(Default)]
struct SharedStats {
    plans_completed: AtomicU64,
    plans_failed: AtomicU64,
}

/// Snapshot of pool activity.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub plans_completed: u64,
    pub plans_failed: u64,
}

impl PoolStats {
    /// Total plan attempts observed.
    pub fn total(&self) -> u64 {
        self.plans_completed + self.plans_failed
    }
}

/// Pool of workers draining batch plans.
pub struct ExecutorPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
    stats: Arc<SharedStats>,
}

impl ExecutorPool {
    /// Spawns the workers and returns the pool together with the plan
    /// sender and the result receiver.
    pub fn start(
        executor: Arc<BatchExecutor>,
        config: PoolConfig,
    ) -> Result<(Self, mpsc::Sender<BatchPlan>, mpsc::Receiver<BatchResult>), PoolError> {
        if config.num_workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        let (plan_tx, plan_rx) = mpsc::channel::<BatchPlan>(config.queue_depth);
        let (result_tx, result_rx) = mpsc::channel::<BatchResult>(config.queue_depth);
        let (shutdown_tx, _) = broadcast::channel(1);
        let plan_rx = Arc::new(Mutex::new(plan_rx));
        let stats = Arc::new(SharedStats::default());

        let mut handles = Vec::with_capacity(config.num_workers);
        for worker_id in 0..config.num_workers {
            let plan_rx = Arc::clone(&plan_rx);
            let result_tx = result_tx.clone();
            let executor = Arc::clone(&executor);
            let stats = Arc::clone(&stats);
            let mut shutdown_rx = shutdown_tx.subscribe();

            handles.push(tokio::spawn(async move {
                debug!(worker_id, "worker started");
                loop {
                    let plan = tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        plan = Self::next_plan(&plan_rx) => plan,
                    };
                    let Some(plan) = plan else { break };

                    for result in executor.execute(vec![plan]).await {
                        if result.success {
                            stats.plans_completed.fetch_add(1, Ordering::Relaxed);
                        } else {
                            stats.plans_failed.fetch_add(1, Ordering::Relaxed);
                        }
                        if result_tx.send(result).await.is_err() {
                            debug!(worker_id, "result channel closed, stopping");
                            return;
                        }
                    }
                }
                debug!(worker_id, "worker stopped");
            }));
        }

        Ok((
            Self {
                handles,
                shutdown_tx,
                stats,
            },
            plan_tx,
            result_rx,
        ))
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            plans_completed: self.stats.plans_completed.load(Ordering::Relaxed),
            plans_failed: self.stats.plans_failed.load(Ordering::Relaxed),
        }
    }

    /// Signals shutdown and waits for every worker to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("executor pool stopped");
    }

    async fn next_plan(plan_rx: &Arc<Mutex<mpsc::Receiver<BatchPlan>>>) -> Option<BatchPlan> {
        let mut rx = plan_rx.lock().await;
        rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::batch::executor::{BatchInference, ExecutionError};
    use crate::batch::task::LlmTask;
    use crate::router::TaskType;

    struct OkBackend;

    #[async_trait]
    impl BatchInference for OkBackend {
        async fn infer(&self, _plan: &BatchPlan) -> Result<(), ExecutionError> {
            Ok(())
        }
    }

    fn plan(id: &str) -> BatchPlan {
        BatchPlan::new(
            "m",
            vec![LlmTask::new(0, id, "doc", TaskType::Extraction, 10)],
            "Batch finalization",
        )
    }

    #[tokio::test]
    async fn test_pool_drains_plans() {
        let executor = Arc::new(BatchExecutor::new(Arc::new(OkBackend)));
        let (pool, plan_tx, mut result_rx) =
            ExecutorPool::start(executor, PoolConfig::default()).expect("pool starts");

        for i in 0..5 {
            plan_tx.send(plan(&format!("t{i}"))).await.expect("send plan");
        }
        drop(plan_tx);

        let mut received = 0;
        while let Some(result) = result_rx.recv().await {
            assert!(result.success);
            received += 1;
            if received == 5 {
                break;
            }
        }

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_pool_counts_outcomes() {
        struct FailBackend;

        #[async_trait]
        impl BatchInference for FailBackend {
            async fn infer(&self, _plan: &BatchPlan) -> Result<(), ExecutionError> {
                Err(ExecutionError::Inference("no capacity".to_string()))
            }
        }

        let executor = Arc::new(BatchExecutor::new(Arc::new(FailBackend)));
        let (pool, plan_tx, mut result_rx) = ExecutorPool::start(
            executor,
            PoolConfig {
                num_workers: 2,
                queue_depth: 8,
            },
        )
        .expect("pool starts");

        plan_tx.send(plan("t0")).await.expect("send plan");
        let result = result_rx.recv().await.expect("one result");
        assert!(!result.success);

        drop(plan_tx);
        let stats = pool.stats();
        assert_eq!(stats.plans_failed, 1);
        assert_eq!(stats.total(), 1);
        pool.shutdown().await;
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let executor = Arc::new(BatchExecutor::new(Arc::new(OkBackend)));
        let result = ExecutorPool::start(
            executor,
            PoolConfig {
                num_workers: 0,
                queue_depth: 1,
            },
        );
        assert!(matches!(result, Err(PoolError::NoWorkers)));
    }
}

//! Batching: task queue, GPU-aware planning and fallback-capable execution.

pub mod executor;
pub mod gpu;
pub mod planner;
pub mod pool;
pub mod queue;
pub mod task;

pub use executor::{BatchExecutor, BatchInference, BatchResult, ExecutionError};
pub use gpu::{GpuProbe, GpuStatus, NullProbe, NvidiaSmiProbe, StaticProbe};
pub use planner::{BatchPlan, BatchPlanner};
pub use pool::{ExecutorPool, PoolConfig, PoolStats};
pub use queue::TaskQueue;
pub use task::{LlmTask, TaskConstraints};

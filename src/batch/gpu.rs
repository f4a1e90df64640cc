//! GPU memory probing behind a pluggable capability.
//!
//! The planner only ever sees a snapshot of [`GpuStatus`] values; where they
//! come from is an implementation detail. The vendor-CLI probe shells out to
//! `nvidia-smi` under a timeout and degrades to an empty sample on any
//! failure, so a missing tool never breaks planning.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

/// A process currently holding GPU memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuProcess {
    pub pid: u32,
    pub name: String,
    pub memory_mb: u64,
}

/// Snapshot of one GPU's memory state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuStatus {
    pub index: u32,
    pub name: String,
    pub total_memory_mb: u64,
    pub used_memory_mb: u64,
    pub free_memory_mb: u64,
    #[serde(default)]
    pub processes: Vec<GpuProcess>,
}

/// Capability that samples GPU memory state.
#[async_trait]
pub trait GpuProbe: Send + Sync {
    /// Best-effort snapshot; an empty result means "no GPU information".
    async fn sample(&self) -> Vec<GpuStatus>;
}

/// Probe that never reports GPU information.
#[derive(Debug, Default)]
pub struct NullProbe;

#[async_trait]
impl GpuProbe for NullProbe {
    async fn sample(&self) -> Vec<GpuStatus> {
        Vec::new()
    }
}

/// Probe returning a fixed snapshot, for tests and dry runs.
#[derive(Debug, Clone)]
pub struct StaticProbe {
    status: Vec<GpuStatus>,
}

impl StaticProbe {
    /// Creates a probe that always reports `status`.
    pub fn new(status: Vec<GpuStatus>) -> Self {
        Self { status }
    }

    /// Convenience: a single anonymous GPU with the given free memory.
    pub fn with_free_memory_mb(free_memory_mb: u64) -> Self {
        Self::new(vec![GpuStatus {
            index: 0,
            name: "static".to_string(),
            total_memory_mb: free_memory_mb,
            used_memory_mb: 0,
            free_memory_mb,
            processes: Vec::new(),
        }])
    }
}

#[async_trait]
impl GpuProbe for StaticProbe {
    async fn sample(&self) -> Vec<GpuStatus> {
        self.status.clone()
    }
}

/// Probe wrapping the `nvidia-smi` vendor CLI.
pub struct NvidiaSmiProbe {
    binary: String,
    timeout: Duration,
}

impl NvidiaSmiProbe {
    /// Creates a probe invoking `nvidia-smi` with a 5 second timeout.
    pub fn new() -> Self {
        Self {
            binary: "nvidia-smi".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Overrides the binary path.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Overrides the subprocess timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, args: &[&str]) -> String {
        let invocation = Command::new(&self.binary).args(args).output();
        match tokio::time::timeout(self.timeout, invocation).await {
            Ok(Ok(output)) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
            Ok(Ok(output)) => {
                debug!(status = ?output.status, "nvidia-smi returned non-zero status");
                String::new()
            }
            Ok(Err(err)) => {
                debug!(error = %err, "failed to spawn nvidia-smi");
                String::new()
            }
            Err(_) => {
                debug!("nvidia-smi timed out");
                String::new()
            }
        }
    }

    fn parse_gpu_output(output: &str) -> Vec<GpuStatus> {
        let mut status = Vec::new();
        for line in output.lines() {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() != 5 {
                continue;
            }
            let (Ok(index), Ok(total), Ok(used), Ok(free)) = (
                parts[0].parse(),
                parts[2].parse(),
                parts[3].parse(),
                parts[4].parse(),
            ) else {
                continue;
            };
            status.push(GpuStatus {
                index,
                name: parts[1].to_string(),
                total_memory_mb: total,
                used_memory_mb: used,
                free_memory_mb: free,
                processes: Vec::new(),
            });
        }
        status
    }

    fn attach_processes(status: &mut [GpuStatus], output: &str) {
        for line in output.lines() {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() != 4 {
                continue;
            }
            let (Ok(pid), Ok(memory_mb)) = (parts[1].parse(), parts[3].parse()) else {
                continue;
            };
            if let Some(first) = status.first_mut() {
                first.processes.push(GpuProcess {
                    pid,
                    name: parts[2].to_string(),
                    memory_mb,
                });
            }
        }
    }
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GpuProbe for NvidiaSmiProbe {
    async fn sample(&self) -> Vec<GpuStatus> {
        let gpu_output = self
            .run(&[
                "--query-gpu=index,name,memory.total,memory.used,memory.free",
                "--format=csv,noheader,nounits",
            ])
            .await;
        let mut status = Self::parse_gpu_output(&gpu_output);
        if status.is_empty() {
            return status;
        }

        let process_output = self
            .run(&[
                "--query-compute-apps=gpu_uuid,pid,process_name,used_memory",
                "--format=csv,noheader,nounits",
            ])
            .await;
        Self::attach_processes(&mut status, &process_output);
        status
    }
}

//! Model-agnostic benchmark runner and result persistence.
//!
//! The runner drives an opaque [`ModelEndpoint`] over a list of benchmark
//! requests, bounding every invocation with a wall-clock timeout, and records
//! one [`BenchmarkResult`] per request whether the call succeeded or not.
//! Results are the replayable evidence stream behind the profile store.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::context::estimator::estimate_tokens;
use crate::error::LlmError;
use crate::router::TaskType;

/// A single benchmark invocation to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRequest {
    pub model_id: String,
    pub task_type: TaskType,
    pub document_id: String,
    /// Path of the raw document fed to the endpoint.
    pub document_path: PathBuf,
}

/// Outcome of a single benchmark invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub model_id: String,
    pub task_type: TaskType,
    pub document_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    #[serde(default)]
    pub error: Option<String>,
}

impl BenchmarkResult {
    /// Wall-clock duration of the invocation in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        (self.finished_at - self.started_at)
            .num_microseconds()
            .map(|us| us as f64 / 1000.0)
            .unwrap_or_else(|| (self.finished_at - self.started_at).num_milliseconds() as f64)
    }
}

/// Serialized row shape: the result plus its derived duration.
#[derive(Serialize)]
struct BenchmarkRow<'a> {
    #[serde(flatten)]
    result: &'a BenchmarkResult,
    duration_ms: f64,
}

/// Stores benchmark outputs and flushes them as a JSON array.
pub struct ResultWriter {
    output_path: PathBuf,
    records: Vec<BenchmarkResult>,
}

impl ResultWriter {
    /// Creates a writer targeting `output_path`.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            records: Vec::new(),
        }
    }

    /// Appends a result to the in-memory log.
    pub fn add(&mut self, result: BenchmarkResult) {
        self.records.push(result);
    }

    /// Recorded results, in insertion order.
    pub fn records(&self) -> &[BenchmarkResult] {
        &self.records
    }

    /// Writes all records as a pretty JSON array, creating parent
    /// directories and overwriting any previous file.
    pub async fn flush(&self) -> std::io::Result<()> {
        if let Some(parent) = self.output_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let rows: Vec<BenchmarkRow<'_>> = self
            .records
            .iter()
            .map(|result| BenchmarkRow {
                result,
                duration_ms: result.duration_ms(),
            })
            .collect();
        let payload = serde_json::to_vec_pretty(&rows)?;
        fs::write(&self.output_path, payload).await
    }
}

/// Opaque inference endpoint the benchmarks are run against.
#[async_trait]
pub trait ModelEndpoint: Send + Sync {
    /// Runs one task against one model and reports produced output tokens.
    async fn invoke(
        &self,
        model_id: &str,
        task_type: TaskType,
        document: &str,
    ) -> Result<EndpointOutput, LlmError>;
}

/// Minimal response contract of a [`ModelEndpoint`].
#[derive(Debug, Clone, Default)]
pub struct EndpointOutput {
    pub output_tokens: u32,
}

/// Executes benchmark tasks against a provided model endpoint.
pub struct BenchmarkRunner<E> {
    endpoint: E,
    writer: ResultWriter,
    timeout: Duration,
}

impl<E: ModelEndpoint> BenchmarkRunner<E> {
    /// Creates a runner with the default 120 second invocation timeout.
    pub fn new(endpoint: E, writer: ResultWriter) -> Self {
        Self {
            endpoint,
            writer,
            timeout: Duration::from_secs(120),
        }
    }

    /// Overrides the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs every request, records a result for each, and flushes the
    /// writer once at the end.
    pub async fn run(
        &mut self,
        requests: &[BenchmarkRequest],
    ) -> std::io::Result<Vec<BenchmarkResult>> {
        let mut results = Vec::with_capacity(requests.len());

        for request in requests {
            let raw_text = fs::read_to_string(&request.document_path).await?;
            let started = Utc::now();
            let mut output_tokens = 0;
            let error = match self.invoke_with_timeout(request, &raw_text).await {
                Ok(output) => {
                    output_tokens = output.output_tokens;
                    None
                }
                Err(err) => Some(err.to_string()),
            };
            let finished = Utc::now();

            let result = BenchmarkResult {
                model_id: request.model_id.clone(),
                task_type: request.task_type,
                document_id: request.document_id.clone(),
                started_at: started,
                finished_at: finished,
                input_tokens: estimate_tokens(&raw_text),
                output_tokens,
                error,
            };
            self.writer.add(result.clone());
            results.push(result);
        }

        self.writer.flush().await?;
        Ok(results)
    }

    async fn invoke_with_timeout(
        &self,
        request: &BenchmarkRequest,
        raw_text: &str,
    ) -> Result<EndpointOutput, LlmError> {
        tokio::time::timeout(
            self.timeout,
            self.endpoint
                .invoke(&request.model_id, request.task_type, raw_text),
        )
        .await
        .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))?
    }
}

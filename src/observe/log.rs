//! Append-only JSON log collectors.
//!
//! A [`JsonLog`] accumulates typed records in memory, indexes each one
//! best-effort into Elasticsearch when a sink is attached, and flushes the
//! whole collection as a pretty JSON array (parent directories created,
//! previous file overwritten).

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::fs;
use tracing::warn;

use crate::batch::{BatchPlan, BatchResult, GpuStatus};
use crate::preprocess::DocumentFeatures;
use crate::router::{RouteOutcome, RouterInputs};

use super::elastic::ElasticClient;
use super::records::{BatchLog, CandidateLog, DecisionLog, PreprocessRecord, RunSummaryEntry};

/// Generic append-only collector for one record class.
pub struct JsonLog<T> {
    output_path: PathBuf,
    records: Vec<T>,
    sink: Option<Arc<ElasticClient>>,
    index: String,
}

impl<T: Serialize> JsonLog<T> {
    /// Creates a collector writing to `output_path` and indexing into
    /// `index` when a sink is given.
    pub fn new(
        output_path: impl Into<PathBuf>,
        sink: Option<Arc<ElasticClient>>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            output_path: output_path.into(),
            records: Vec::new(),
            sink,
            index: index.into(),
        }
    }

    /// Appends a record, indexing it best-effort.
    pub async fn record(&mut self, record: T) {
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.index(&self.index, &record).await {
                warn!(index = %self.index, error = %err, "failed to index log record");
            }
        }
        self.records.push(record);
    }

    /// Recorded entries in insertion order.
    pub fn records(&self) -> &[T] {
        &self.records
    }

    /// Writes all records as a pretty JSON array.
    pub async fn flush(&self) -> std::io::Result<()> {
        if let Some(parent) = self.output_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(&self.records)?;
        fs::write(&self.output_path, payload).await
    }
}

/// Collects batch execution metrics for later analysis.
pub struct BatchLogger {
    log: JsonLog<BatchLog>,
}

impl BatchLogger {
    /// Creates a batch logger.
    pub fn new(
        output_path: impl Into<PathBuf>,
        sink: Option<Arc<ElasticClient>>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            log: JsonLog::new(output_path, sink, index),
        }
    }

    /// Records one execution attempt together with the GPU snapshot the
    /// planner saw.
    pub async fn record(&mut self, result: &BatchResult, gpu_status: &[GpuStatus]) {
        let plan: &BatchPlan = &result.plan;
        let actual_tokens = plan.tasks.iter().map(|t| t.token_estimate).sum();
        self.log
            .record(BatchLog {
                model_id: plan.model_id.clone(),
                batch_size: plan.tasks.len(),
                estimated_tokens: plan.total_tokens,
                actual_tokens,
                gpu_free_memory_mb: gpu_status.first().map(|gpu| gpu.free_memory_mb),
                success: result.success,
                error: result.error.clone(),
                reason: plan.reason.clone(),
            })
            .await;
    }

    /// Recorded batch logs.
    pub fn records(&self) -> &[BatchLog] {
        self.log.records()
    }

    /// Flushes to disk.
    pub async fn flush(&self) -> std::io::Result<()> {
        self.log.flush().await
    }
}

/// Collects routing decisions for auditability.
pub struct RouterLogger {
    log: JsonLog<DecisionLog>,
}

impl RouterLogger {
    /// Creates a router logger.
    pub fn new(
        output_path: impl Into<PathBuf>,
        sink: Option<Arc<ElasticClient>>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            log: JsonLog::new(output_path, sink, index),
        }
    }

    /// Records a routing outcome against the inputs that produced it.
    pub async fn record(&mut self, inputs: &RouterInputs, outcome: &RouteOutcome) {
        let candidates = outcome
            .candidates
            .iter()
            .map(|verdict| CandidateLog {
                model_id: verdict.model_id.clone(),
                reason: verdict.reason.clone(),
            })
            .collect();
        self.log
            .record(DecisionLog {
                document_features: inputs.document_features.clone(),
                task_type: inputs.task_type,
                constraints: inputs.constraints.clone(),
                chosen_model: outcome.decision.model_id.clone(),
                candidates,
            })
            .await;
    }

    /// Recorded decisions.
    pub fn records(&self) -> &[DecisionLog] {
        self.log.records()
    }

    /// Flushes to disk.
    pub async fn flush(&self) -> std::io::Result<()> {
        self.log.flush().await
    }
}

/// Captures machine-readable run summaries for pipeline executions.
pub struct RunSummary {
    log: JsonLog<RunSummaryEntry>,
}

impl RunSummary {
    /// Creates a run summary collector.
    pub fn new(
        output_path: impl Into<PathBuf>,
        sink: Option<Arc<ElasticClient>>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            log: JsonLog::new(output_path, sink, index),
        }
    }

    /// Records the terminal state of one document.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_entry(
        &mut self,
        document_id: impl Into<String>,
        model_id: impl Into<String>,
        router_reason: impl Into<String>,
        batch_events: Vec<String>,
        fallback_events: Vec<String>,
        validation_status: impl Into<String>,
    ) {
        self.log
            .record(RunSummaryEntry {
                document_id: document_id.into(),
                model_id: model_id.into(),
                router_reason: router_reason.into(),
                batch_events,
                fallback_events,
                validation_status: validation_status.into(),
            })
            .await;
    }

    /// Recorded entries.
    pub fn entries(&self) -> &[RunSummaryEntry] {
        self.log.records()
    }

    /// Flushes to disk.
    pub async fn flush(&self) -> std::io::Result<()> {
        self.log.flush().await
    }
}

/// Collects preprocessing metrics.
pub struct PreprocessLogger {
    log: JsonLog<PreprocessRecord>,
}

impl PreprocessLogger {
    /// Creates a preprocess logger.
    pub fn new(
        output_path: impl Into<PathBuf>,
        sink: Option<Arc<ElasticClient>>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            log: JsonLog::new(output_path, sink, index),
        }
    }

    /// Records the outcome of preprocessing one document.
    pub async fn log_result(
        &mut self,
        document_id: impl Into<String>,
        raw_text: &str,
        cleaned_text: &str,
        features: &DocumentFeatures,
        errors: Vec<String>,
    ) {
        self.log
            .record(PreprocessRecord {
                document_id: document_id.into(),
                original_length: raw_text.chars().count(),
                cleaned_length: cleaned_text.chars().count(),
                token_estimate: features.token_estimate,
                sections: features.sections,
                language: features.language.clone(),
                financial_terms: features.financial_terms,
                errors,
            })
            .await;
    }

    /// Recorded entries.
    pub fn records(&self) -> &[PreprocessRecord] {
        self.log.records()
    }

    /// Flushes to disk.
    pub async fn flush(&self) -> std::io::Result<()> {
        self.log.flush().await
    }
}

//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::batch::{BatchPlanner, LlmTask, NullProbe, NvidiaSmiProbe};
use crate::observe::{ElasticClient, IndexNames, RouterLogger};
use crate::preprocess::DocumentFeatures;
use crate::profiles::{BenchmarkResult, ProfileAggregator};
use crate::router::{CandidateModel, Constraints, HeuristicRouter, RouterInputs, TaskType};
use crate::validate::{ConsistencyChecker, JsonExtractor, SchemaValidator};

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, payload)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

/// Aggregates a benchmark result file into per-model profiles.
pub async fn aggregate(input: &Path, output: &Path) -> anyhow::Result<()> {
    let results: Vec<BenchmarkResult> = read_json(input).await?;
    let profiles = ProfileAggregator::new().aggregate(&results);
    write_json(output, &profiles).await?;
    info!(
        results = results.len(),
        models = profiles.len(),
        output = %output.display(),
        "aggregated benchmark results"
    );
    Ok(())
}

/// Routes one document and prints the outcome.
pub async fn route(
    features: &Path,
    candidates: &Path,
    task: &str,
    min_context: u32,
    max_latency_ms: Option<f64>,
    log: Option<&Path>,
) -> anyhow::Result<()> {
    let document_features: DocumentFeatures = read_json(features).await?;
    let candidate_models: Vec<CandidateModel> = read_json(candidates).await?;
    let task_type: TaskType = task.parse().map_err(anyhow::Error::msg)?;

    let inputs = RouterInputs {
        document_features,
        task_type,
        candidate_models,
        constraints: Constraints {
            max_latency_ms,
            ..Constraints::default()
        },
    };
    let outcome = HeuristicRouter::new().route(&inputs, min_context);

    if let Some(log_path) = log {
        let sink = ElasticClient::from_env().map(Arc::new);
        let mut logger = RouterLogger::new(log_path, sink, IndexNames::from_env().router);
        logger.record(&inputs, &outcome).await;
        logger.flush().await?;
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Plans batches from a task file and prints the plans.
pub async fn plan(
    tasks: &Path,
    max_batch_size: usize,
    max_tokens: u32,
    min_free_memory_mb: u64,
    gpu: bool,
) -> anyhow::Result<()> {
    let tasks: Vec<LlmTask> = read_json(tasks).await?;
    let planner = if gpu {
        BatchPlanner::with_gpu_probe(Arc::new(NvidiaSmiProbe::new()))
    } else {
        BatchPlanner::with_gpu_probe(Arc::new(NullProbe))
    };
    let plans = planner
        .plan(tasks, max_batch_size, max_tokens, min_free_memory_mb)
        .await;

    info!(plans = plans.len(), "planned batches");
    println!("{}", serde_json::to_string_pretty(&plans)?);
    Ok(())
}

/// Extracts JSON from a raw model output and validates it.
pub async fn validate(
    payload: &Path,
    schema: &Path,
    context: Option<&Path>,
    entities: &[String],
    keywords: &[String],
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(payload)
        .await
        .with_context(|| format!("reading {}", payload.display()))?;

    let extraction = match JsonExtractor::new().extract(&raw) {
        Ok(extraction) => extraction,
        Err(err) => {
            println!(
                "{}",
                serde_json::json!({"valid": false, "error_kind": err.kind.to_string()})
            );
            return Ok(());
        }
    };

    let validator = SchemaValidator::from_file(schema)?;
    let result = validator.validate(&extraction.value);

    let consistency = match context {
        Some(context_path) if !entities.is_empty() || !keywords.is_empty() => {
            let context_text = tokio::fs::read_to_string(context_path).await?;
            Some(ConsistencyChecker::new().evaluate(&context_text, entities, keywords))
        }
        _ => None,
    };

    let report = serde_json::json!({
        "valid": result.valid && consistency.as_ref().map_or(true, |c| c.passed),
        "schema": result,
        "consistency": consistency,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

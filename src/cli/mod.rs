//! docflow command-line interface.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Document-processing control plane CLI.
#[derive(Debug, Parser)]
#[command(name = "docflow", version, about)]
pub struct Cli {
    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Aggregate benchmark results into per-model task profiles.
    Aggregate {
        /// JSON array of benchmark results.
        #[arg(long)]
        input: PathBuf,
        /// Output path for the aggregated profiles.
        #[arg(long)]
        output: PathBuf,
    },

    /// Route a document against a candidate model list.
    Route {
        /// JSON file with the document features.
        #[arg(long)]
        features: PathBuf,
        /// JSON array of candidate models.
        #[arg(long)]
        candidates: PathBuf,
        /// Task type (classification, extraction, summarization, rag).
        #[arg(long)]
        task: String,
        /// Context capacity floor in tokens.
        #[arg(long, default_value_t = 1024)]
        min_context: u32,
        /// Optional latency constraint in milliseconds.
        #[arg(long)]
        max_latency_ms: Option<f64>,
        /// Optional decision-log output path.
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Plan batches from a task file.
    Plan {
        /// JSON array of queued tasks.
        #[arg(long)]
        tasks: PathBuf,
        #[arg(long, default_value_t = 8)]
        max_batch_size: usize,
        #[arg(long, default_value_t = 8192)]
        max_tokens: u32,
        #[arg(long, default_value_t = 0)]
        min_free_memory_mb: u64,
        /// Probe GPU memory via nvidia-smi before planning.
        #[arg(long)]
        gpu: bool,
    },

    /// Extract and validate a model output against a schema.
    Validate {
        /// File holding the raw model output.
        #[arg(long)]
        payload: PathBuf,
        /// Draft-07 JSON schema file.
        #[arg(long)]
        schema: PathBuf,
        /// Optional context file for consistency checks.
        #[arg(long)]
        context: Option<PathBuf>,
        /// Entities that must appear in the context.
        #[arg(long = "entity")]
        entities: Vec<String>,
        /// Keywords counted toward the overlap threshold.
        #[arg(long = "keyword")]
        keywords: Vec<String>,
    },
}

/// Parses command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Runs the parsed command.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Aggregate { input, output } => commands::aggregate(&input, &output).await,
        Command::Route {
            features,
            candidates,
            task,
            min_context,
            max_latency_ms,
            log,
        } => {
            commands::route(
                &features,
                &candidates,
                &task,
                min_context,
                max_latency_ms,
                log.as_deref(),
            )
            .await
        }
        Command::Plan {
            tasks,
            max_batch_size,
            max_tokens,
            min_free_memory_mb,
            gpu,
        } => commands::plan(&tasks, max_batch_size, max_tokens, min_free_memory_mb, gpu).await,
        Command::Validate {
            payload,
            schema,
            context,
            entities,
            keywords,
        } => commands::validate(&payload, &schema, context.as_deref(), &entities, &keywords).await,
    }
}

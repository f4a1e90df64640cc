//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Knobs governing routing, batching and fallback behavior.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum tasks per batch before adaptive downsizing.
    pub max_batch_size: usize,
    /// Maximum summed token estimate per batch before downsizing.
    pub max_tokens_per_batch: u32,
    /// GPU free-memory threshold that triggers downsizing.
    pub min_free_memory_mb: u64,
    /// Context capacity floor applied by the router.
    pub min_context_tokens: u32,
    /// Retries allowed for transient parse/schema failures.
    pub retry_limit: u32,
    /// Wall-clock bound per inference invocation.
    pub inference_timeout: Duration,
    /// Workers draining batch plans.
    pub num_workers: usize,
    /// Directory receiving the JSON log artifacts.
    pub log_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 8,
            max_tokens_per_batch: 8192,
            min_free_memory_mb: 4096,
            min_context_tokens: 1024,
            retry_limit: 2,
            inference_timeout: Duration::from_secs(120),
            num_workers: 4,
            log_dir: PathBuf::from("./logs"),
        }
    }
}

impl PipelineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DOCFLOW_MAX_BATCH_SIZE`: tasks per batch (default: 8)
    /// - `DOCFLOW_MAX_TOKENS_PER_BATCH`: tokens per batch (default: 8192)
    /// - `DOCFLOW_MIN_FREE_MEMORY_MB`: downsizing threshold (default: 4096)
    /// - `DOCFLOW_MIN_CONTEXT_TOKENS`: router capacity floor (default: 1024)
    /// - `DOCFLOW_RETRY_LIMIT`: fallback retry limit (default: 2)
    /// - `DOCFLOW_INFERENCE_TIMEOUT_SECS`: invocation timeout (default: 120)
    /// - `DOCFLOW_NUM_WORKERS`: executor pool size (default: 4)
    /// - `DOCFLOW_LOG_DIR`: log artifact directory (default: ./logs)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = Self::parse_env("DOCFLOW_MAX_BATCH_SIZE")? {
            config.max_batch_size = value;
        }
        if let Some(value) = Self::parse_env("DOCFLOW_MAX_TOKENS_PER_BATCH")? {
            config.max_tokens_per_batch = value;
        }
        if let Some(value) = Self::parse_env("DOCFLOW_MIN_FREE_MEMORY_MB")? {
            config.min_free_memory_mb = value;
        }
        if let Some(value) = Self::parse_env("DOCFLOW_MIN_CONTEXT_TOKENS")? {
            config.min_context_tokens = value;
        }
        if let Some(value) = Self::parse_env("DOCFLOW_RETRY_LIMIT")? {
            config.retry_limit = value;
        }
        if let Some(value) = Self::parse_env::<u64>("DOCFLOW_INFERENCE_TIMEOUT_SECS")? {
            config.inference_timeout = Duration::from_secs(value);
        }
        if let Some(value) = Self::parse_env("DOCFLOW_NUM_WORKERS")? {
            config.num_workers = value;
        }
        if let Ok(dir) = std::env::var("DOCFLOW_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        match std::env::var(key) {
            Ok(raw) => raw
                .parse()
                .map(Some)
                .map_err(|err: T::Err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: err.to_string(),
                }),
            Err(_) => Ok(None),
        }
    }
}

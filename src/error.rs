//! Error types shared across docflow subsystems.
//!
//! Subsystem-local error enums (queue, executor, pipeline, observability)
//! live next to their types; this module holds the errors that cross module
//! boundaries, most notably the transport errors surfaced by the remote
//! inference adapter.

use thiserror::Error;

/// Errors that can occur during remote LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: OPENROUTER_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse model response: {0}")]
    ParseError(String),

    #[error("Model response did not include choices")]
    EmptyResponse,

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Inference timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

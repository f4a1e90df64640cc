//! docflow: a document-processing control plane for LLM workloads.
//!
//! Dispatches text-understanding tasks (classification, extraction,
//! summarization, RAG) across a heterogeneous model pool under token,
//! latency, GPU-memory and schema constraints, with append-only evidence
//! logs feeding routing decisions back.

// Core modules
pub mod batch;
pub mod cli;
pub mod context;
pub mod error;
pub mod llm;
pub mod observe;
pub mod pipeline;
pub mod preprocess;
pub mod profiles;
pub mod router;
pub mod validate;

// Re-export commonly used error types
pub use error::LlmError;

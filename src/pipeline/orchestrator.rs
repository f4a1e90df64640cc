//! Linear stage machine driving a document through the pipeline.
//!
//! Collectors and preprocessors are registered by name; routing, batching,
//! inference and validation are single stage functions. Every transition is
//! traced, and the state carries a free-form metadata map that stages use to
//! hand results to their successors.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::info;

use crate::validate::ErrorKind;

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No collector registered for the requested source type.
    #[error("No collector registered for {0}")]
    UnknownSource(String),

    /// No preprocessor registered for the requested variant.
    #[error("No preprocessor variant {0}")]
    UnknownPreprocessor(String),

    /// A stage failed.
    #[error("Stage {stage} failed: {message}")]
    StageFailed { stage: String, message: String },

    /// A stage reached a terminal error kind; the document gets no output.
    #[error("Terminal failure: {0}")]
    Terminal(ErrorKind),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl PipelineError {
    /// Builds a stage failure for the given stage.
    pub fn stage(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self::StageFailed {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    /// The terminal error kind recorded in the run summary, when any.
    pub fn terminal_kind(&self) -> Option<&ErrorKind> {
        match self {
            Self::Terminal(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Stages a document passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Collected,
    Preprocessed,
    Routed,
    Batched,
    Inferred,
    Validated,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Collected => write!(f, "collected"),
            PipelineStage::Preprocessed => write!(f, "preprocessed"),
            PipelineStage::Routed => write!(f, "routed"),
            PipelineStage::Batched => write!(f, "batched"),
            PipelineStage::Inferred => write!(f, "inferred"),
            PipelineStage::Validated => write!(f, "validated"),
        }
    }
}

/// Mutable state threaded through the stages.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub document_id: String,
    pub stage: PipelineStage,
    /// Free-form stage outputs keyed by name.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl PipelineState {
    /// Creates the initial state for a document.
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            stage: PipelineStage::Collected,
            metadata: serde_json::Map::new(),
        }
    }

    /// Stores a stage output.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Reads a stage output.
    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}

/// An async stage transforming the pipeline state.
pub type StageFn =
    Arc<dyn Fn(PipelineState) -> BoxFuture<'static, Result<PipelineState, PipelineError>> + Send + Sync>;

/// Wraps an async closure as a [`StageFn`].
pub fn stage_fn<F, Fut>(f: F) -> StageFn
where
    F: Fn(PipelineState) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<PipelineState, PipelineError>> + Send + 'static,
{
    Arc::new(move |state| Box::pin(f(state)))
}

/// Executes pipeline stages sequentially with logging and status tracking.
pub struct PipelineOrchestrator {
    collectors: HashMap<String, StageFn>,
    preprocessors: HashMap<String, StageFn>,
    router: StageFn,
    batcher: StageFn,
    inference: StageFn,
    validator: StageFn,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator from the four fixed stages.
    pub fn new(router: StageFn, batcher: StageFn, inference: StageFn, validator: StageFn) -> Self {
        Self {
            collectors: HashMap::new(),
            preprocessors: HashMap::new(),
            router,
            batcher,
            inference,
            validator,
        }
    }

    /// Registers a collector for a source type.
    pub fn with_collector(mut self, source_type: impl Into<String>, collector: StageFn) -> Self {
        self.collectors.insert(source_type.into(), collector);
        self
    }

    /// Registers a preprocessor variant.
    pub fn with_preprocessor(mut self, variant: impl Into<String>, preprocessor: StageFn) -> Self {
        self.preprocessors.insert(variant.into(), preprocessor);
        self
    }

    /// Drives one document through every stage.
    pub async fn run(
        &self,
        document_id: &str,
        source_type: &str,
        preprocess_variant: &str,
    ) -> Result<PipelineState, PipelineError> {
        let state = PipelineState::new(document_id);
        info!(document_id, stage = %state.stage, "starting pipeline");

        let collector = self
            .collectors
            .get(source_type)
            .ok_or_else(|| PipelineError::UnknownSource(source_type.to_string()))?;
        let state = Self::advance(state, PipelineStage::Collected, collector).await?;

        let preprocessor = self
            .preprocessors
            .get(preprocess_variant)
            .ok_or_else(|| PipelineError::UnknownPreprocessor(preprocess_variant.to_string()))?;
        let state = Self::advance(state, PipelineStage::Preprocessed, preprocessor).await?;

        let state = Self::advance(state, PipelineStage::Routed, &self.router).await?;
        let state = Self::advance(state, PipelineStage::Batched, &self.batcher).await?;
        let state = Self::advance(state, PipelineStage::Inferred, &self.inference).await?;
        let state = Self::advance(state, PipelineStage::Validated, &self.validator).await?;

        info!(document_id, stage = %state.stage, "pipeline completed");
        Ok(state)
    }

    async fn advance(
        state: PipelineState,
        next_stage: PipelineStage,
        step: &StageFn,
    ) -> Result<PipelineState, PipelineError> {
        let document_id = state.document_id.clone();
        info!(document_id = %document_id, stage = %next_stage, "running stage");
        let mut updated = step(state).await?;
        updated.stage = next_stage;
        info!(document_id = %document_id, stage = %next_stage, "stage completed");
        Ok(updated)
    }
}

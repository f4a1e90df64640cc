//! Per-task default model registry.
//!
//! The registry is an explicitly constructed dependency; callers build it
//! once (usually from the environment at startup) and pass it where needed.

use std::collections::HashMap;
use std::env;

use crate::router::TaskType;

const FALLBACK_MODEL: &str = "openai/gpt-4o-mini";

/// Maps task types to their preferred OpenRouter model identifiers.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    task_models: HashMap<TaskType, String>,
    fallback: String,
}

impl ModelRegistry {
    /// Builds the registry from environment variables, falling back to the
    /// built-in defaults.
    ///
    /// Reads `OPENROUTER_MODEL_CLASSIFICATION`, `OPENROUTER_MODEL_EXTRACTION`,
    /// `OPENROUTER_MODEL_RAG`, `OPENROUTER_MODEL_SUMMARIZATION` and
    /// `OPENROUTER_MODEL_DEFAULT`.
    pub fn from_env() -> Self {
        let fallback =
            env::var("OPENROUTER_MODEL_DEFAULT").unwrap_or_else(|_| FALLBACK_MODEL.to_string());
        let mut task_models = HashMap::new();
        task_models.insert(
            TaskType::Classification,
            env::var("OPENROUTER_MODEL_CLASSIFICATION")
                .unwrap_or_else(|_| "google/gemini-pro".to_string()),
        );
        task_models.insert(
            TaskType::Extraction,
            env::var("OPENROUTER_MODEL_EXTRACTION")
                .unwrap_or_else(|_| "anthropic/claude-3.5-sonnet".to_string()),
        );
        task_models.insert(
            TaskType::Rag,
            env::var("OPENROUTER_MODEL_RAG")
                .unwrap_or_else(|_| "perplexity/sonar-medium-online".to_string()),
        );
        task_models.insert(
            TaskType::Summarization,
            env::var("OPENROUTER_MODEL_SUMMARIZATION").unwrap_or_else(|_| fallback.clone()),
        );
        Self {
            task_models,
            fallback,
        }
    }

    /// Builds a registry with an explicit shared default and no per-task
    /// overrides.
    pub fn with_fallback(fallback: impl Into<String>) -> Self {
        Self {
            task_models: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    /// The preferred model for a task, or the shared default.
    pub fn default_model_for_task(&self, task_type: TaskType) -> &str {
        self.task_models
            .get(&task_type)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    /// Overrides the model associated with a task at runtime.
    pub fn register_model(&mut self, task_type: TaskType, model_id: impl Into<String>) {
        self.task_models.insert(task_type, model_id.into());
    }

    /// A copy of the configured task models.
    pub fn available_task_models(&self) -> HashMap<TaskType, String> {
        self.task_models.clone()
    }
}

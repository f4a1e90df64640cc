//! Remote model access: the OpenRouter transport and per-task defaults.

pub mod openrouter;
pub mod registry;

pub use openrouter::{ChatMessage, ChatRequest, CompletionResult, CompletionUsage, OpenRouterClient};
pub use registry::ModelRegistry;

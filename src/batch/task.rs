//! Work units queued for batched inference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::router::TaskType;

/// Model key used when a task pins no model at all.
pub const UNSPECIFIED_MODEL: &str = "unspecified";

/// Optional constraints such as a fixed model or resource caps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConstraints {
    #[serde(default)]
    pub preferred_model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub gpu_required: bool,
}

/// Individual work unit queued for batching.
///
/// Queue ordering considers only `(priority, deadline)`; an absent deadline
/// is treated as infinitely far in the future.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmTask {
    pub priority: i32,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    pub task_id: String,
    pub doc_id: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub target_model: Option<String>,
    pub token_estimate: u32,
    #[serde(default)]
    pub constraints: TaskConstraints,
}

impl LlmTask {
    /// Creates a task with default constraints and no deadline.
    pub fn new(
        priority: i32,
        task_id: impl Into<String>,
        doc_id: impl Into<String>,
        task_type: TaskType,
        token_estimate: u32,
    ) -> Self {
        Self {
            priority,
            deadline: None,
            task_id: task_id.into(),
            doc_id: doc_id.into(),
            task_type,
            target_model: None,
            token_estimate,
            constraints: TaskConstraints::default(),
        }
    }

    /// Sets the deadline.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Pins the task to a model.
    pub fn with_target_model(mut self, model_id: impl Into<String>) -> Self {
        self.target_model = Some(model_id.into());
        self
    }

    /// Sets the constraints.
    pub fn with_constraints(mut self, constraints: TaskConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// The model this task batches under: target model, then the preferred
    /// model from its constraints, then the unspecified bucket.
    pub fn effective_model(&self) -> &str {
        self.target_model
            .as_deref()
            .or(self.constraints.preferred_model.as_deref())
            .unwrap_or(UNSPECIFIED_MODEL)
    }

    /// Ordering key: absent deadlines sort after every concrete deadline.
    pub(crate) fn queue_key(&self) -> (i32, DateTime<Utc>) {
        (self.priority, self.deadline.unwrap_or(DateTime::<Utc>::MAX_UTC))
    }
}

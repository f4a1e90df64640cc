//! Fallback policy mapping error kinds to recovery actions.
//!
//! The policy is a pure function; the orchestrator wrapping it is the sole
//! authority that advances retry counters, and counters are monotonic per
//! task.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::router::TaskType;

use super::ErrorKind;

/// The closed set of outcomes the policy may prescribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackActionKind {
    Retry,
    RepromptStrict,
    ShrinkContext,
    SwitchModel,
    Abort,
}

impl std::fmt::Display for FallbackActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackActionKind::Retry => write!(f, "retry"),
            FallbackActionKind::RepromptStrict => write!(f, "reprompt_strict"),
            FallbackActionKind::ShrinkContext => write!(f, "shrink_context"),
            FallbackActionKind::SwitchModel => write!(f, "switch_model"),
            FallbackActionKind::Abort => write!(f, "abort"),
        }
    }
}

/// A prescribed recovery step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackAction {
    pub action: FallbackActionKind,
    pub reason: String,
    #[serde(default)]
    pub next_model: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
}

impl FallbackAction {
    fn new(action: FallbackActionKind, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
            next_model: None,
            retry_count: 0,
        }
    }
}

/// Determines fallback actions based on error kind and context.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    retry_limit: u32,
}

impl FallbackPolicy {
    /// Creates a policy with the default retry limit of 2.
    pub fn new() -> Self {
        Self { retry_limit: 2 }
    }

    /// Overrides the retry limit.
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// The configured retry limit.
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    /// Pure decision function; never mutates state.
    pub fn decide(
        &self,
        error_kind: &ErrorKind,
        _task_type: TaskType,
        _model_id: &str,
        previous_retries: u32,
        alternative_model: Option<&str>,
    ) -> FallbackAction {
        if previous_retries < self.retry_limit
            && matches!(
                error_kind,
                ErrorKind::DecodeError(_) | ErrorKind::SchemaFailure
            )
        {
            let mut action = FallbackAction::new(
                FallbackActionKind::Retry,
                "Retrying due to transient parse/schema issue",
            );
            action.retry_count = previous_retries + 1;
            return action;
        }

        match error_kind {
            ErrorKind::NoJsonCandidate => FallbackAction::new(
                FallbackActionKind::RepromptStrict,
                "Reprompt with stricter JSON instructions",
            ),
            ErrorKind::MissingField | ErrorKind::TypeMismatch | ErrorKind::EnumMismatch => {
                FallbackAction::new(
                    FallbackActionKind::RepromptStrict,
                    "Schema validation failure; enforce stricter JSON response",
                )
            }
            ErrorKind::ConsistencyFailed => match alternative_model {
                Some(alt) => {
                    let mut action = FallbackAction::new(
                        FallbackActionKind::SwitchModel,
                        "Consistency check failed; switching model",
                    );
                    action.next_model = Some(alt.to_string());
                    action
                }
                None => FallbackAction::new(
                    FallbackActionKind::ShrinkContext,
                    "Consistency failure; reducing context for targeted rerun",
                ),
            },
            other => FallbackAction::new(
                FallbackActionKind::Abort,
                format!("No fallback available for error {other}"),
            ),
        }
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Context attached to a fallback decision.
#[derive(Debug, Clone)]
pub struct FallbackContext {
    pub task_type: TaskType,
    pub model_id: String,
    pub alternative_model: Option<String>,
}

/// Applies the policy, advances per-task retry counters and logs decisions.
pub struct FallbackOrchestrator {
    policy: FallbackPolicy,
    retries: HashMap<String, u32>,
}

impl FallbackOrchestrator {
    /// Creates an orchestrator over the default policy.
    pub fn new() -> Self {
        Self::with_policy(FallbackPolicy::new())
    }

    /// Creates an orchestrator over a custom policy.
    pub fn with_policy(policy: FallbackPolicy) -> Self {
        Self {
            policy,
            retries: HashMap::new(),
        }
    }

    /// Retries observed so far for a task.
    pub fn retries_for(&self, task_id: &str) -> u32 {
        self.retries.get(task_id).copied().unwrap_or(0)
    }

    /// Decides the recovery action for a task failure and records the
    /// advanced retry counter when the action is a retry.
    pub fn handle_error(
        &mut self,
        task_id: &str,
        error_kind: &ErrorKind,
        context: &FallbackContext,
    ) -> FallbackAction {
        let previous_retries = self.retries_for(task_id);
        let action = self.policy.decide(
            error_kind,
            context.task_type,
            &context.model_id,
            previous_retries,
            context.alternative_model.as_deref(),
        );

        if action.action == FallbackActionKind::Retry {
            let counter = self.retries.entry(task_id.to_string()).or_insert(0);
            // Counters only ever move forward.
            *counter = (*counter).max(action.retry_count);
        }

        info!(
            action = %action.action,
            model = %context.model_id,
            error = %error_kind,
            reason = %action.reason,
            next_model = action.next_model.as_deref().unwrap_or("-"),
            retries = action.retry_count,
            "fallback decision"
        );
        action
    }
}

impl Default for FallbackOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(policy: &FallbackPolicy, kind: &ErrorKind, retries: u32, alt: Option<&str>) -> FallbackAction {
        policy.decide(kind, TaskType::Extraction, "model-a", retries, alt)
    }

    #[test]
    fn test_decode_error_retries_below_limit() {
        let policy = FallbackPolicy::new();
        let action = decide(&policy, &ErrorKind::DecodeError("bad".to_string()), 0, None);
        assert_eq!(action.action, FallbackActionKind::Retry);
        assert_eq!(action.retry_count, 1);

        let action = decide(&policy, &ErrorKind::SchemaFailure, 1, None);
        assert_eq!(action.action, FallbackActionKind::Retry);
        assert_eq!(action.retry_count, 2);
    }

    #[test]
    fn test_retry_limit_reached_aborts() {
        let policy = FallbackPolicy::new();
        let action = decide(&policy, &ErrorKind::DecodeError("bad".to_string()), 2, None);
        assert_eq!(action.action, FallbackActionKind::Abort);
    }

    #[test]
    fn test_json_and_schema_issues_reprompt() {
        let policy = FallbackPolicy::new();
        for kind in [
            ErrorKind::NoJsonCandidate,
            ErrorKind::MissingField,
            ErrorKind::TypeMismatch,
            ErrorKind::EnumMismatch,
        ] {
            let action = decide(&policy, &kind, 0, None);
            assert_eq!(action.action, FallbackActionKind::RepromptStrict, "{kind}");
        }
    }

    #[test]
    fn test_consistency_failure_switches_or_shrinks() {
        let policy = FallbackPolicy::new();

        let switched = decide(&policy, &ErrorKind::ConsistencyFailed, 0, Some("M2"));
        assert_eq!(switched.action, FallbackActionKind::SwitchModel);
        assert_eq!(switched.next_model.as_deref(), Some("M2"));

        let shrunk = decide(&policy, &ErrorKind::ConsistencyFailed, 0, None);
        assert_eq!(shrunk.action, FallbackActionKind::ShrinkContext);
        assert!(shrunk.next_model.is_none());
    }

    #[test]
    fn test_unknown_errors_abort() {
        let policy = FallbackPolicy::new();
        for kind in [
            ErrorKind::Oom,
            ErrorKind::Timeout,
            ErrorKind::TransportError,
            ErrorKind::Other("mystery".to_string()),
        ] {
            let action = decide(&policy, &kind, 0, None);
            assert_eq!(action.action, FallbackActionKind::Abort, "{kind}");
            assert!(action.reason.contains(&kind.to_string()));
        }
    }

    #[test]
    fn test_orchestrator_advances_retries_monotonically() {
        let mut orchestrator = FallbackOrchestrator::new();
        let context = FallbackContext {
            task_type: TaskType::Extraction,
            model_id: "m".to_string(),
            alternative_model: None,
        };
        let kind = ErrorKind::SchemaFailure;

        let first = orchestrator.handle_error("t-1", &kind, &context);
        assert_eq!(first.retry_count, 1);
        assert_eq!(orchestrator.retries_for("t-1"), 1);

        let second = orchestrator.handle_error("t-1", &kind, &context);
        assert_eq!(second.retry_count, 2);
        assert_eq!(orchestrator.retries_for("t-1"), 2);

        // Limit reached: the third attempt aborts and the counter holds.
        let third = orchestrator.handle_error("t-1", &kind, &context);
        assert_eq!(third.action, FallbackActionKind::Abort);
        assert_eq!(orchestrator.retries_for("t-1"), 2);
    }

    #[test]
    fn test_orchestrator_tracks_tasks_independently() {
        let mut orchestrator = FallbackOrchestrator::new();
        let context = FallbackContext {
            task_type: TaskType::Classification,
            model_id: "m".to_string(),
            alternative_model: None,
        };
        orchestrator.handle_error("a", &ErrorKind::SchemaFailure, &context);
        assert_eq!(orchestrator.retries_for("a"), 1);
        assert_eq!(orchestrator.retries_for("b"), 0);
    }
}

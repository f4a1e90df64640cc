//! Token budget management per model.
//!
//! A [`Budget`] applies a fractional safety margin to raw input/output caps
//! before any check. The [`TokenBudgetManager`] keeps one budget per model
//! and answers feasibility questions for prompts; it deliberately keeps no
//! running counters, since the router and planner already enforce per-batch
//! budgets.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::estimator::{estimate_tokens, TokenStats};

/// Input/output token caps for a single model, with a safety margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Raw input token cap.
    pub max_input_tokens: u32,
    /// Raw output token cap.
    pub max_output_tokens: u32,
    /// Fractional reserve in `[0, 1)` subtracted before any check.
    pub safety_margin: f64,
}

impl Budget {
    /// Creates a budget with the default 10% safety margin.
    pub fn new(max_input_tokens: u32, max_output_tokens: u32) -> Self {
        Self {
            max_input_tokens,
            max_output_tokens,
            safety_margin: 0.1,
        }
    }

    /// Sets the safety margin.
    pub fn with_safety_margin(mut self, margin: f64) -> Self {
        self.safety_margin = margin;
        self
    }

    /// Effective input cap after applying the safety margin.
    pub fn effective_input(&self) -> u32 {
        Self::effective(self.max_input_tokens, self.safety_margin)
    }

    /// Effective output cap after applying the safety margin.
    pub fn effective_output(&self) -> u32 {
        Self::effective(self.max_output_tokens, self.safety_margin)
    }

    /// Input tokens still available after `used_tokens`. Never negative.
    pub fn remaining_input(&self, used_tokens: u32) -> u32 {
        self.effective_input().saturating_sub(used_tokens)
    }

    /// Output tokens still available after `used_tokens`. Never negative.
    pub fn remaining_output(&self, used_tokens: u32) -> u32 {
        self.effective_output().saturating_sub(used_tokens)
    }

    fn effective(limit: u32, margin: f64) -> u32 {
        let factor = (1.0 - margin).max(0.0);
        (f64::from(limit) * factor).floor() as u32
    }
}

/// Registry of per-model token budgets.
#[derive(Debug, Default)]
pub struct TokenBudgetManager {
    budgets: HashMap<String, Budget>,
}

impl TokenBudgetManager {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the budget for a model.
    pub fn register_budget(&mut self, model_id: impl Into<String>, budget: Budget) {
        self.budgets.insert(model_id.into(), budget);
    }

    /// Looks up the budget for a model.
    pub fn budget(&self, model_id: &str) -> Option<&Budget> {
        self.budgets.get(model_id)
    }

    /// Returns whether a prompt plus expected output fits the model's budget.
    ///
    /// Unknown models never accommodate anything.
    pub fn can_accommodate(
        &self,
        model_id: &str,
        prompt: &str,
        expected_output_tokens: u32,
    ) -> bool {
        let Some(budget) = self.budgets.get(model_id) else {
            return false;
        };
        let stats = TokenStats::new(estimate_tokens(prompt), expected_output_tokens);
        stats.input_tokens <= budget.remaining_input(0)
            && stats.output_tokens <= budget.remaining_output(0)
    }

    /// Re-checks that a request fits and reports the verdict.
    ///
    /// No usage is persisted across invocations; per-batch enforcement lives
    /// in the planner.
    pub fn consume(&self, model_id: &str, stats: TokenStats) -> bool {
        let Some(budget) = self.budgets.get(model_id) else {
            return false;
        };
        stats.input_tokens <= budget.remaining_input(0)
            && stats.output_tokens <= budget.remaining_output(0)
    }
}

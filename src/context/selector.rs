//! Budget-aware selection of document sections.
//!
//! Sections are considered strictly in input order; selection is a prefix of
//! the non-empty sections. The first section that would overflow the
//! remaining budget terminates selection and is recorded as skipped, so the
//! decision trail stays auditable.

use serde::{Deserialize, Serialize};

use crate::preprocess::NormalizedSection;
use crate::router::TaskType;

use super::budget::Budget;
use super::estimator::estimate_tokens;

/// One selection verdict: a section together with why it was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub section: NormalizedSection,
    pub reason: String,
    /// Estimated tokens contributed; zero for the terminating skip record.
    pub token_estimate: u32,
}

/// Chooses document sections while respecting token constraints.
pub struct SectionSelector {
    budget: Budget,
}

impl SectionSelector {
    /// Creates a selector over the given budget.
    pub fn new(budget: Budget) -> Self {
        Self { budget }
    }

    /// Selects a prefix of sections fitting the effective input capacity.
    ///
    /// Sections whose paragraphs estimate to zero tokens are skipped without
    /// emitting a result.
    pub fn select(
        &self,
        sections: &[NormalizedSection],
        task_type: TaskType,
    ) -> Vec<SelectionResult> {
        let mut remaining = self.budget.remaining_input(0);
        let mut selected = Vec::new();

        for section in sections {
            let tokens = estimate_tokens(&section.body());
            if tokens == 0 {
                continue;
            }

            if tokens > remaining {
                let title = section.title.as_deref().unwrap_or("untitled");
                selected.push(SelectionResult {
                    section: section.clone(),
                    reason: format!("Skipped {title} due to token limit"),
                    token_estimate: 0,
                });
                break;
            }

            selected.push(SelectionResult {
                section: section.clone(),
                reason: self.justify(section, task_type),
                token_estimate: tokens,
            });
            remaining -= tokens;
        }

        selected
    }

    fn justify(&self, section: &NormalizedSection, task_type: TaskType) -> String {
        let title = section.title.as_deref().unwrap_or("untitled");
        let financial = section
            .title
            .as_deref()
            .map(|t| t.to_lowercase().contains("financial"))
            .unwrap_or(false);

        if task_type == TaskType::Extraction && financial {
            return format!("Included {title}: required financial signals");
        }
        if task_type == TaskType::Summarization {
            return format!("Included {title}: preserve narrative continuity");
        }
        format!("Included {title}: sequential allocation")
    }
}

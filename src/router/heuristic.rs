//! Heuristic model router.
//!
//! The router is a pipeline of filters over the candidate list: context
//! capacity, then latency, then a deterministic preference for low failure
//! rates. A candidate with no benchmark data is never disqualified by the
//! context filter. Per-candidate reasoning accumulates in a verdict table
//! parallel to the input list, which becomes the decision log.

use serde::{Deserialize, Serialize};

use super::types::{CandidateModel, Constraints, RouterInputs};

/// Outcome of routing: the chosen model, or a reason nothing survived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Chosen model, absent when every candidate was filtered out.
    pub model_id: Option<String>,
    /// Human-auditable explanation of the verdict.
    pub reason: String,
}

/// Per-candidate verdict accumulated while routing, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateVerdict {
    pub model_id: String,
    pub reason: String,
}

/// Routing decision together with the full per-candidate verdict table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub decision: RoutingDecision,
    pub candidates: Vec<CandidateVerdict>,
}

/// Applies transparent decision rules to select a model.
#[derive(Debug, Default)]
pub struct HeuristicRouter;

impl HeuristicRouter {
    /// Creates a router.
    pub fn new() -> Self {
        Self
    }

    /// Routes the inputs, requiring at least `min_context_tokens` of profiled
    /// context capacity from candidates that carry evidence.
    pub fn route(&self, inputs: &RouterInputs, min_context_tokens: u32) -> RouteOutcome {
        let mut verdicts: Vec<String> = vec![String::new(); inputs.candidate_models.len()];

        let survivors = self.filter_by_context(inputs, min_context_tokens, &mut verdicts);
        if survivors.is_empty() {
            return Self::outcome(inputs, verdicts, None, "Filtered by context capacity");
        }

        let survivors = self.filter_by_latency(inputs, &survivors, &mut verdicts);
        if survivors.is_empty() {
            return Self::outcome(inputs, verdicts, None, "Filtered by latency constraint");
        }

        let winner = if survivors.len() == 1 {
            survivors[0]
        } else {
            self.prefer_low_failure(&inputs.candidate_models, &survivors, &mut verdicts)
        };

        let reason = format!("Selected based on {}", verdicts[winner]);
        Self::outcome(inputs, verdicts, Some(winner), &reason)
    }

    /// Keeps candidates whose profiled capacity covers both the configured
    /// floor and the document's own token estimate. Candidates without
    /// evidence for this task are kept.
    fn filter_by_context(
        &self,
        inputs: &RouterInputs,
        min_context_tokens: u32,
        verdicts: &mut [String],
    ) -> Vec<usize> {
        let required = f64::from(min_context_tokens.max(inputs.document_features.token_estimate));
        let mut eligible = Vec::new();

        for (index, candidate) in inputs.candidate_models.iter().enumerate() {
            let capacity = candidate
                .profile
                .as_ref()
                .and_then(|profile| profile.task(inputs.task_type))
                .map(|task| task.tokens);

            match capacity {
                None => {
                    verdicts[index] = "no profile data; keeping candidate".to_string();
                    eligible.push(index);
                }
                Some(capacity) if capacity >= required => {
                    verdicts[index] = format!("context capacity {capacity} ok");
                    eligible.push(index);
                }
                Some(capacity) => {
                    verdicts[index] = format!("context capacity {capacity} insufficient");
                }
            }
        }

        eligible
    }

    /// Keeps candidates whose expected latency is unknown or within the
    /// constraint; a no-op when no latency bound is set.
    fn filter_by_latency(
        &self,
        inputs: &RouterInputs,
        survivors: &[usize],
        verdicts: &mut [String],
    ) -> Vec<usize> {
        let Some(max_latency_ms) = inputs.constraints.max_latency_ms else {
            return survivors.to_vec();
        };

        let mut eligible = Vec::new();
        for &index in survivors {
            let candidate = &inputs.candidate_models[index];
            match candidate.expected_latency_ms {
                Some(latency) if latency > max_latency_ms => {
                    verdicts[index].push_str("; latency exceeded");
                }
                _ => {
                    verdicts[index].push_str("; latency ok");
                    eligible.push(index);
                }
            }
        }
        eligible
    }

    /// Orders survivors by (failure rate, expected latency) ascending;
    /// unknown failure rates sort as 1.0, unknown latency as infinite.
    fn prefer_low_failure(
        &self,
        candidates: &[CandidateModel],
        survivors: &[usize],
        verdicts: &mut [String],
    ) -> usize {
        let mut ordered = survivors.to_vec();
        ordered.sort_by(|&a, &b| {
            let key = |index: usize| {
                let candidate = &candidates[index];
                (
                    candidate.failure_rate.unwrap_or(1.0),
                    candidate.expected_latency_ms.unwrap_or(f64::INFINITY),
                )
            };
            let (fa, la) = key(a);
            let (fb, lb) = key(b);
            fa.partial_cmp(&fb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(la.partial_cmp(&lb).unwrap_or(std::cmp::Ordering::Equal))
        });

        let winner = ordered[0];
        verdicts[winner].push_str("; lowest failure rate");
        winner
    }

    fn outcome(
        inputs: &RouterInputs,
        verdicts: Vec<String>,
        winner: Option<usize>,
        reason: &str,
    ) -> RouteOutcome {
        let candidates = inputs
            .candidate_models
            .iter()
            .zip(verdicts)
            .map(|(candidate, reason)| CandidateVerdict {
                model_id: candidate.model_id.clone(),
                reason: if reason.is_empty() {
                    "n/a".to_string()
                } else {
                    reason
                },
            })
            .collect();

        RouteOutcome {
            decision: RoutingDecision {
                model_id: winner.map(|index| inputs.candidate_models[index].model_id.clone()),
                reason: reason.to_string(),
            },
            candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::DocumentFeatures;
    use crate::profiles::{ModelProfile, TaskProfile};
    use crate::router::types::TaskType;

    fn features(token_estimate: u32) -> DocumentFeatures {
        DocumentFeatures {
            token_estimate,
            ..DocumentFeatures::default()
        }
    }

    fn profiled(model: &str, tokens: f64) -> CandidateModel {
        CandidateModel::new(model).with_profile(
            ModelProfile::new(model)
                .with_task(TaskType::Extraction, TaskProfile::new(0.0, tokens, 0.0, 3)),
        )
    }

    #[test]
    fn test_profile_tolerant_context_filter() {
        let inputs = RouterInputs {
            document_features: features(1500),
            task_type: TaskType::Extraction,
            candidate_models: vec![
                CandidateModel::new("a"),
                profiled("b", 4000.0).with_failure_rate(0.02),
                profiled("c", 1000.0).with_failure_rate(0.01),
            ],
            constraints: Constraints::default(),
        };

        let outcome = HeuristicRouter::new().route(&inputs, 2000);
        assert_eq!(outcome.decision.model_id.as_deref(), Some("b"));
        assert!(outcome.decision.reason.contains("context capacity 4000 ok"));

        assert_eq!(outcome.candidates[0].reason, "no profile data; keeping candidate");
        assert!(outcome.candidates[2]
            .reason
            .contains("context capacity 1000 insufficient"));
    }

    #[test]
    fn test_all_unprofiled_candidates_survive() {
        let inputs = RouterInputs {
            document_features: features(100),
            task_type: TaskType::Classification,
            candidate_models: vec![CandidateModel::new("a"), CandidateModel::new("b")],
            constraints: Constraints::default(),
        };
        let outcome = HeuristicRouter::new().route(&inputs, 10_000);
        // No evidence means nobody is disqualified.
        assert!(outcome.decision.model_id.is_some());
        for verdict in &outcome.candidates {
            assert!(verdict.reason.contains("no profile data"));
        }
    }

    #[test]
    fn test_no_survivor_reports_context_stage() {
        let inputs = RouterInputs {
            document_features: features(100),
            task_type: TaskType::Extraction,
            candidate_models: vec![profiled("small", 50.0)],
            constraints: Constraints::default(),
        };
        let outcome = HeuristicRouter::new().route(&inputs, 500);
        assert_eq!(outcome.decision.model_id, None);
        assert_eq!(outcome.decision.reason, "Filtered by context capacity");
    }

    #[test]
    fn test_latency_filter_drops_slow_candidates() {
        let inputs = RouterInputs {
            document_features: features(100),
            task_type: TaskType::Extraction,
            candidate_models: vec![
                CandidateModel::new("slow").with_expected_latency_ms(900.0),
                CandidateModel::new("fast").with_expected_latency_ms(200.0),
            ],
            constraints: Constraints {
                max_latency_ms: Some(500.0),
                ..Constraints::default()
            },
        };
        let outcome = HeuristicRouter::new().route(&inputs, 0);
        assert_eq!(outcome.decision.model_id.as_deref(), Some("fast"));
        assert!(outcome.candidates[0].reason.contains("latency exceeded"));
        assert!(outcome.candidates[1].reason.contains("latency ok"));
    }

    #[test]
    fn test_latency_filter_keeps_unknown_latency() {
        let inputs = RouterInputs {
            document_features: features(100),
            task_type: TaskType::Extraction,
            candidate_models: vec![CandidateModel::new("mystery")],
            constraints: Constraints {
                max_latency_ms: Some(10.0),
                ..Constraints::default()
            },
        };
        let outcome = HeuristicRouter::new().route(&inputs, 0);
        assert_eq!(outcome.decision.model_id.as_deref(), Some("mystery"));
    }

    #[test]
    fn test_no_survivor_reports_latency_stage() {
        let inputs = RouterInputs {
            document_features: features(100),
            task_type: TaskType::Extraction,
            candidate_models: vec![CandidateModel::new("slow").with_expected_latency_ms(900.0)],
            constraints: Constraints {
                max_latency_ms: Some(500.0),
                ..Constraints::default()
            },
        };
        let outcome = HeuristicRouter::new().route(&inputs, 0);
        assert_eq!(outcome.decision.model_id, None);
        assert_eq!(outcome.decision.reason, "Filtered by latency constraint");
    }

    #[test]
    fn test_chosen_model_is_from_input_list() {
        let inputs = RouterInputs {
            document_features: features(10),
            task_type: TaskType::Rag,
            candidate_models: vec![
                CandidateModel::new("x").with_failure_rate(0.3),
                CandidateModel::new("y").with_failure_rate(0.1),
            ],
            constraints: Constraints::default(),
        };
        let outcome = HeuristicRouter::new().route(&inputs, 0);
        let chosen = outcome.decision.model_id.expect("a model is chosen");
        assert!(inputs.candidate_ids().contains(&chosen.as_str()));
        assert_eq!(chosen, "y");
    }

    #[test]
    fn test_ties_break_on_latency() {
        let inputs = RouterInputs {
            document_features: features(10),
            task_type: TaskType::Rag,
            candidate_models: vec![
                CandidateModel::new("slow")
                    .with_failure_rate(0.1)
                    .with_expected_latency_ms(800.0),
                CandidateModel::new("fast")
                    .with_failure_rate(0.1)
                    .with_expected_latency_ms(100.0),
            ],
            constraints: Constraints::default(),
        };
        let outcome = HeuristicRouter::new().route(&inputs, 0);
        assert_eq!(outcome.decision.model_id.as_deref(), Some("fast"));
    }
}

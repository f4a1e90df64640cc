//! Typed, append-only log record shapes.
//!
//! Every record class has an explicit struct so logs persist as JSON without
//! losing field types; the tagged [`LogRecord`] union exists for sinks that
//! carry mixed record streams.

use serde::{Deserialize, Serialize};

use crate::preprocess::DocumentFeatures;
use crate::profiles::BenchmarkResult;
use crate::router::{Constraints, TaskType};

/// One batch execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchLog {
    pub model_id: String,
    pub batch_size: usize,
    pub estimated_tokens: u32,
    pub actual_tokens: u32,
    #[serde(default)]
    pub gpu_free_memory_mb: Option<u64>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub reason: String,
}

/// Per-candidate routing verdict as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLog {
    pub model_id: String,
    pub reason: String,
}

/// One routing decision with its full candidate trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLog {
    pub document_features: DocumentFeatures,
    pub task_type: TaskType,
    pub constraints: Constraints,
    #[serde(default)]
    pub chosen_model: Option<String>,
    pub candidates: Vec<CandidateLog>,
}

/// Terminal summary of one document's trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummaryEntry {
    pub document_id: String,
    pub model_id: String,
    pub router_reason: String,
    pub batch_events: Vec<String>,
    pub fallback_events: Vec<String>,
    pub validation_status: String,
}

/// Preprocessing metrics for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessRecord {
    pub document_id: String,
    pub original_length: usize,
    pub cleaned_length: usize,
    pub token_estimate: u32,
    pub sections: usize,
    #[serde(default)]
    pub language: Option<String>,
    pub financial_terms: bool,
    pub errors: Vec<String>,
}

/// Discriminated union over every log record class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum LogRecord {
    Batch(BatchLog),
    Decision(DecisionLog),
    RunSummary(RunSummaryEntry),
    Preprocess(PreprocessRecord),
    Benchmark(BenchmarkResult),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_log_round_trip() {
        let log = DecisionLog {
            document_features: DocumentFeatures {
                language: Some("en".to_string()),
                character_count: 1234,
                token_estimate: 308,
                sections: 3,
                financial_terms: true,
            },
            task_type: TaskType::Extraction,
            constraints: Constraints {
                max_latency_ms: Some(800.0),
                max_tokens: None,
                hardware_slot: None,
            },
            chosen_model: Some("local-llm-small".to_string()),
            candidates: vec![
                CandidateLog {
                    model_id: "local-llm-small".to_string(),
                    reason: "context capacity 9200 ok; latency ok; lowest failure rate".to_string(),
                },
                CandidateLog {
                    model_id: "local-llm-large".to_string(),
                    reason: "context capacity 15000 ok; latency ok".to_string(),
                },
            ],
        };

        let json = serde_json::to_string(&log).expect("serializes");
        let parsed: DecisionLog = serde_json::from_str(&json).expect("parses");
        assert_eq!(parsed, log);
    }

    #[test]
    fn test_log_record_is_tagged() {
        let record = LogRecord::Batch(BatchLog {
            model_id: "m".to_string(),
            batch_size: 2,
            estimated_tokens: 800,
            actual_tokens: 800,
            gpu_free_memory_mb: Some(4000),
            success: true,
            error: None,
            reason: "Batch finalization".to_string(),
        });
        let json = serde_json::to_value(&record).expect("serializes");
        assert_eq!(json["record"], "batch");
        assert_eq!(json["model_id"], "m");
    }
}

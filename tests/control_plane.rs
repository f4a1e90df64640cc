//! End-to-end scenarios for the routing + batching + validation loop.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use docflow::batch::{
    BatchExecutor, BatchInference, BatchPlan, BatchPlanner, ExecutionError, LlmTask, StaticProbe,
    TaskQueue,
};
use docflow::observe::{BatchLogger, RouterLogger, RunSummary};
use docflow::preprocess::DocumentFeatures;
use docflow::profiles::{ModelProfile, TaskProfile};
use docflow::router::{CandidateModel, Constraints, HeuristicRouter, RouterInputs, TaskType};
use docflow::validate::{
    ConsistencyChecker, ErrorKind, FallbackActionKind, FallbackOrchestrator, JsonExtractor,
    SchemaValidator,
};

fn task(priority: i32, id: &str, task_type: TaskType, tokens: u32, model: &str) -> LlmTask {
    LlmTask::new(priority, id, "doc-1", task_type, tokens).with_target_model(model)
}

#[test]
fn routing_tolerates_missing_profiles() {
    let inputs = RouterInputs {
        document_features: DocumentFeatures {
            token_estimate: 1500,
            ..DocumentFeatures::default()
        },
        task_type: TaskType::Extraction,
        candidate_models: vec![
            CandidateModel::new("A"),
            CandidateModel::new("B")
                .with_profile(ModelProfile::new("B").with_task(
                    TaskType::Extraction,
                    TaskProfile::new(0.0, 4000.0, 0.02, 5),
                ))
                .with_failure_rate(0.02),
            CandidateModel::new("C")
                .with_profile(ModelProfile::new("C").with_task(
                    TaskType::Extraction,
                    TaskProfile::new(0.0, 1000.0, 0.01, 5),
                ))
                .with_failure_rate(0.01),
        ],
        constraints: Constraints::default(),
    };

    let outcome = HeuristicRouter::new().route(&inputs, 2000);
    assert_eq!(outcome.decision.model_id.as_deref(), Some("B"));
    assert!(outcome.decision.reason.contains("context capacity 4000 ok"));
    // The winner must come from the candidate list.
    assert!(inputs
        .candidate_ids()
        .contains(&outcome.decision.model_id.as_deref().unwrap()));
}

#[tokio::test]
async fn batch_packing_downsizes_under_memory_pressure() {
    let planner = BatchPlanner::with_gpu_probe(Arc::new(StaticProbe::with_free_memory_mb(4000)));
    let tasks = vec![
        task(0, "t1", TaskType::Extraction, 1200, "M"),
        task(1, "t2", TaskType::Extraction, 800, "M"),
        task(2, "t3", TaskType::Extraction, 800, "M"),
        task(3, "t4", TaskType::Extraction, 400, "M"),
        task(4, "t5", TaskType::Extraction, 400, "M"),
    ];

    let plans = planner.plan(tasks, 4, 2000, 8000).await;
    let shapes: Vec<Vec<u32>> = plans
        .iter()
        .map(|plan| plan.tasks.iter().map(|t| t.token_estimate).collect())
        .collect();
    assert_eq!(shapes, vec![vec![1200], vec![800], vec![800], vec![400, 400]]);

    for plan in &plans {
        assert_eq!(
            plan.total_tokens,
            plan.tasks.iter().map(|t| t.token_estimate).sum::<u32>()
        );
        assert!(plan.tasks.iter().all(|t| t.effective_model() == plan.model_id));
    }
}

#[test]
fn json_extraction_prefers_fenced_blocks() {
    let extractor = JsonExtractor::new();
    let text = "noise {\"a\":1} more ```json\n{\"b\":2}\n``` tail";
    let extraction = extractor.extract(text).expect("extracts");
    assert_eq!(extraction.value, json!({"b": 2}));
}

#[test]
fn consistency_failure_switches_model_when_alternative_exists() {
    let mut orchestrator = FallbackOrchestrator::new();
    let with_alt = docflow::validate::FallbackContext {
        task_type: TaskType::Extraction,
        model_id: "M1".to_string(),
        alternative_model: Some("M2".to_string()),
    };
    let action = orchestrator.handle_error("t", &ErrorKind::ConsistencyFailed, &with_alt);
    assert_eq!(action.action, FallbackActionKind::SwitchModel);
    assert_eq!(action.next_model.as_deref(), Some("M2"));

    let without_alt = docflow::validate::FallbackContext {
        alternative_model: None,
        ..with_alt
    };
    let action = orchestrator.handle_error("t", &ErrorKind::ConsistencyFailed, &without_alt);
    assert_eq!(action.action, FallbackActionKind::ShrinkContext);
}

#[test]
fn schema_issues_are_classified() {
    let schema = json!({
        "type": "object",
        "required": ["age"],
        "properties": {"age": {"type": "integer"}}
    });
    let validator = SchemaValidator::new(&schema).expect("schema compiles");
    let result = validator.validate(&json!({"name": "x"}));

    assert!(!result.valid);
    assert_eq!(result.issues[0].path, "");
    assert_eq!(result.error_kind(), Some(ErrorKind::MissingField));
}

#[test]
fn typed_dequeue_preserves_the_rest_of_the_queue() {
    let mut queue = TaskQueue::new();
    queue.add_task(task(0, "cls-0", TaskType::Classification, 10, "m"));
    queue.add_task(task(1, "ext-1", TaskType::Extraction, 10, "m"));
    queue.add_task(task(2, "cls-2", TaskType::Classification, 10, "m"));

    let popped = queue.pop_next_batch(2, Some(TaskType::Extraction));
    assert_eq!(popped.len(), 1);
    assert_eq!(popped[0].task_id, "ext-1");

    let remaining = queue.pop_next_batch(10, None);
    let ids: Vec<&str> = remaining.iter().map(|t| t.task_id.as_str()).collect();
    assert_eq!(ids, vec!["cls-0", "cls-2"]);
}

/// Backend that OOMs on multi-task plans and then succeeds, while keeping a
/// call trail for assertions.
struct FlakyBackend {
    calls: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl BatchInference for FlakyBackend {
    async fn infer(&self, plan: &BatchPlan) -> Result<(), ExecutionError> {
        self.calls
            .lock()
            .expect("lock poisoned")
            .push((plan.reason.clone(), plan.tasks.len()));
        if plan.tasks.len() > 1 {
            Err(ExecutionError::Inference("CUDA OOM during forward pass".to_string()))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn execution_splits_on_oom_and_logs_every_attempt() {
    let dir = tempfile::tempdir().expect("tempdir");

    let planner = BatchPlanner::new();
    let plans = planner
        .plan(
            vec![
                task(0, "a", TaskType::Extraction, 500, "M"),
                task(1, "b", TaskType::Extraction, 400, "M"),
            ],
            8,
            4096,
            0,
        )
        .await;
    assert_eq!(plans.len(), 1);

    let backend = Arc::new(FlakyBackend {
        calls: Mutex::new(Vec::new()),
    });
    let executor = BatchExecutor::new(Arc::clone(&backend) as Arc<dyn BatchInference>);
    let results = executor.execute(plans).await;

    // One failed two-task attempt, then two successful singles.
    assert_eq!(results.len(), 3);
    assert!(!results[0].success);
    assert!(results[1].success && results[2].success);

    let mut batch_logger = BatchLogger::new(dir.path().join("batch.json"), None, "batch-events");
    for result in &results {
        batch_logger.record(result, &[]).await;
    }
    batch_logger.flush().await.expect("flushes");

    let records = batch_logger.records();
    assert_eq!(records.len(), 3);
    assert!(records[0].error.as_deref().expect("error").contains("OOM"));
    assert_eq!(records[1].reason, "Fallback split part A");
    assert_eq!(records[2].reason, "Fallback split part B");
}

#[tokio::test]
async fn run_summary_records_terminal_validation_status() {
    let dir = tempfile::tempdir().expect("tempdir");

    // Route, fail consistency, exhaust the policy, and summarize.
    let inputs = RouterInputs {
        document_features: DocumentFeatures {
            token_estimate: 100,
            ..DocumentFeatures::default()
        },
        task_type: TaskType::Extraction,
        candidate_models: vec![CandidateModel::new("M1").with_failure_rate(0.1)],
        constraints: Constraints::default(),
    };
    let outcome = HeuristicRouter::new().route(&inputs, 0);
    let chosen = outcome.decision.model_id.clone().expect("routed");

    let mut router_logger = RouterLogger::new(dir.path().join("router.json"), None, "router-decisions");
    router_logger.record(&inputs, &outcome).await;
    router_logger.flush().await.expect("flushes");

    let checker = ConsistencyChecker::new();
    let consistency = checker.evaluate(
        "the context mentions nothing relevant",
        &["Acme Corp".to_string()],
        &["revenue".to_string()],
    );
    assert!(!consistency.passed);

    let mut fallback = FallbackOrchestrator::new();
    let context = docflow::validate::FallbackContext {
        task_type: TaskType::Extraction,
        model_id: chosen.clone(),
        alternative_model: None,
    };
    let action = fallback.handle_error("t-1", &ErrorKind::ConsistencyFailed, &context);
    assert_eq!(action.action, FallbackActionKind::ShrinkContext);

    let mut summary = RunSummary::new(dir.path().join("summary.json"), None, "pipeline-run-summary");
    summary
        .add_entry(
            "doc-1",
            chosen,
            outcome.decision.reason.clone(),
            vec!["Batch finalization".to_string()],
            vec![action.action.to_string()],
            ErrorKind::ConsistencyFailed.to_string(),
        )
        .await;
    summary.flush().await.expect("flushes");

    let payload = std::fs::read_to_string(dir.path().join("summary.json")).expect("written");
    let entries: serde_json::Value = serde_json::from_str(&payload).expect("array");
    assert_eq!(entries[0]["validation_status"], "consistency_failed");
    assert_eq!(entries[0]["fallback_events"][0], "shrink_context");
}

#[test]
fn aggregation_round_trip_is_deterministic() {
    use chrono::{Duration, Utc};
    use docflow::profiles::{BenchmarkResult, ProfileAggregator};

    let started = Utc::now();
    let results: Vec<BenchmarkResult> = (0..10)
        .map(|i| BenchmarkResult {
            model_id: if i % 2 == 0 { "even" } else { "odd" }.to_string(),
            task_type: TaskType::Classification,
            document_id: format!("doc-{i}"),
            started_at: started,
            finished_at: started + Duration::milliseconds(100 + i),
            input_tokens: 1000,
            output_tokens: 50,
            error: (i % 5 == 0).then(|| "transient".to_string()),
        })
        .collect();

    let aggregator = ProfileAggregator::new();
    assert_eq!(aggregator.aggregate(&results), aggregator.aggregate(&results));
}

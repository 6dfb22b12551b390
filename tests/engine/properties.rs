use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use rewoo_engine::engine::ResultType;
use rewoo_engine::{EngineConfig, ExecutionContext, PlanStep, StepStatus};

use super::engine_harness::{Toolbox, echo, engine, failing, plan};

#[tokio::test]
async fn dependents_start_only_after_dependencies_finish() {
    let toolbox = Arc::new(Toolbox::with_delay(Duration::from_millis(15)));
    let engine = engine(EngineConfig::default(), toolbox.clone());
    let mut plan = plan(
        "layered",
        vec![
            echo("fetch", &[]),
            echo("parse", &["fetch"]),
            echo("lookup", &[]),
            echo("merge", &["parse", "lookup"]),
            echo("publish", &["merge"]),
            echo("audit", &["fetch"]),
        ],
    );

    let result = engine
        .run(&mut plan, &ExecutionContext::default())
        .await
        .unwrap();
    assert!(result.is_complete());

    for step in &plan.steps {
        let call = toolbox.invocation(&step.id).unwrap();
        let record = result.record(&step.id).unwrap();
        for dependency in &step.dependencies {
            let upstream = toolbox.invocation(dependency).unwrap();
            assert!(
                call.started >= upstream.finished,
                "{} started before {dependency} finished",
                step.id
            );
            assert!(record.completed_at >= result.record(dependency).unwrap().completed_at);
        }
    }
}

#[tokio::test]
async fn every_step_ends_terminal_without_cancellation() {
    let toolbox = Arc::new(Toolbox::new());
    let engine = engine(EngineConfig::default(), toolbox);
    let mut plan = plan(
        "mixed",
        vec![
            echo("a", &[]),
            failing("b", "boom"),
            echo("c", &["b"]),
            echo("d", &["c", "a"]),
            failing("e", "flaky").optional(),
            echo("f", &["e"]),
        ],
    );

    let result = engine
        .run(&mut plan, &ExecutionContext::default())
        .await
        .unwrap();

    assert!(plan.steps.iter().all(|step| step.status.is_terminal()));
    assert_eq!(
        result.successful_steps.len() + result.failed_steps.len() + result.skipped_steps.len(),
        result.total_steps
    );
    assert_eq!(result.skipped_steps, vec!["c", "d"]);
    assert_eq!(result.failed_steps, vec!["b", "e"]);
    assert!(result.successful_steps.contains(&"f".to_string()));
}

#[tokio::test]
async fn replaying_a_finished_plan_executes_nothing() {
    let toolbox = Arc::new(Toolbox::new());
    let engine = engine(EngineConfig::default(), toolbox.clone());
    let mut plan = plan("replay", vec![echo("a", &[]), echo("b", &["a"])]);

    let first = engine
        .run(&mut plan, &ExecutionContext::default())
        .await
        .unwrap();
    assert!(first.is_complete());
    let results_after_first = plan
        .steps
        .iter()
        .map(|step| step.result.clone())
        .collect::<Vec<_>>();

    let second = engine
        .run(&mut plan, &ExecutionContext::default())
        .await
        .unwrap();

    assert_eq!(second.result_type, ResultType::ExecutionComplete);
    assert!(second.executed_steps.is_empty());
    assert_eq!(toolbox.call_count(), 2);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(
        plan.steps
            .iter()
            .map(|step| step.result.clone())
            .collect::<Vec<_>>(),
        results_after_first
    );
}

#[tokio::test]
async fn replanned_plan_reuses_preserved_results() {
    let toolbox = Arc::new(Toolbox::new());
    let engine = engine(EngineConfig::default(), toolbox.clone());
    let mut plan = plan(
        "revise",
        vec![
            PlanStep::new("total", "calculator", json!({ "expression": "19+23" })),
            PlanStep::new("send", "email_sender", json!({ "to": "nobody", "body": "{{total}}" }))
                .depends_on(["total"]),
        ],
    );

    let first = engine
        .run(&mut plan, &ExecutionContext::default())
        .await
        .unwrap();
    assert!(first.needs_replan());

    // The planner fixes the failed step and resubmits the same lineage.
    let fixed = &mut plan.steps[1];
    fixed.arguments = json!({ "to": "ops@example.com", "body": "{{total}}" });
    fixed.status = StepStatus::Pending;
    fixed.error = None;

    let second = engine
        .run(&mut plan, &ExecutionContext::default())
        .await
        .unwrap();

    assert!(second.is_complete());
    assert_eq!(second.executed_steps.len(), 1);
    assert_eq!(second.executed_steps[0].step_id, "send");
    assert_eq!(
        plan.steps[1].result,
        Some(json!({ "delivered_to": "ops@example.com", "body": 42 }))
    );
    assert_eq!(toolbox.call_count(), 3);
}

#[tokio::test]
async fn cancelled_run_keeps_unstarted_steps_pending() {
    let toolbox = Arc::new(Toolbox::new());
    let engine = engine(EngineConfig::default(), toolbox.clone());
    let token = CancellationToken::new();
    token.cancel();
    let ctx = ExecutionContext::new("stop").with_cancellation(token);
    let mut plan = plan("cancel", vec![echo("a", &[]), echo("b", &["a"])]);

    let result = engine.run(&mut plan, &ctx).await.unwrap();

    assert!(result.cancelled);
    assert_eq!(toolbox.call_count(), 0);
    assert!(
        plan.steps
            .iter()
            .all(|step| step.status == StepStatus::Pending)
    );
    assert_eq!(result.result_type, ResultType::NeedsReplan);
    assert_eq!(result.replan_context.unwrap().primary_cause, "cancelled");
}

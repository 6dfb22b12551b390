use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use rewoo_engine::engine::ResultType;
use rewoo_engine::{EngineConfig, ExecutionContext, PlanStep, StepStatus};

use super::engine_harness::{Toolbox, echo, engine, failing, plan};

#[tokio::test]
async fn single_calculator_step_completes() {
    let toolbox = Arc::new(Toolbox::new());
    let engine = engine(EngineConfig::default(), toolbox.clone());
    let mut plan = plan(
        "calc",
        vec![PlanStep::new("step-1", "calculator", json!({ "expression": "2+3" }))],
    );

    let result = engine
        .run(&mut plan, &ExecutionContext::new("what is 2+3?"))
        .await
        .unwrap();

    assert_eq!(result.result_type, ResultType::ExecutionComplete);
    assert_eq!(result.total_steps, 1);
    assert_eq!(result.successful_steps, vec!["step-1"]);
    assert_eq!(plan.steps[0].result, Some(json!(5)));
    assert!(result.replan_context.is_none());
    assert!(!result.has_signals_problems);
}

#[tokio::test]
async fn failed_email_preserves_upstream_result_for_replan() {
    let toolbox = Arc::new(Toolbox::new());
    let engine = engine(EngineConfig::default(), toolbox);
    let mut plan = plan(
        "notify",
        vec![
            PlanStep::new("good", "calculator", json!({ "expression": "50*2" })),
            PlanStep::new(
                "bad",
                "email_sender",
                json!({ "to": "invalid@domain", "body": "Total: {{good}}" }),
            )
            .depends_on(["good"]),
        ],
    );

    let result = engine
        .run(&mut plan, &ExecutionContext::default())
        .await
        .unwrap();

    assert_eq!(result.result_type, ResultType::NeedsReplan);
    assert_eq!(result.failed_steps, vec!["bad"]);

    let context = result.replan_context.expect("replan context");
    assert_eq!(context.preserved_steps.len(), 1);
    assert_eq!(context.preserved_steps[0].step_id, "good");
    assert_eq!(context.preserved_steps[0].result, json!(100));
    assert!(
        context
            .failure_patterns
            .contains(&"invalid_email_address".to_string())
    );
    assert_eq!(context.primary_cause, "bad: Invalid email address");
    assert_eq!(context.context_for_replan.failed_steps[0].tool, "email_sender");
}

#[tokio::test]
async fn failure_is_isolated_to_its_dependents() {
    let toolbox = Arc::new(Toolbox::new());
    let engine = engine(EngineConfig::default(), toolbox.clone());
    let mut plan = plan(
        "isolation",
        vec![
            failing("A", "upstream unavailable"),
            echo("B", &["A"]),
            echo("C", &[]),
        ],
    );

    let result = engine
        .run(&mut plan, &ExecutionContext::default())
        .await
        .unwrap();

    assert_eq!(plan.steps[0].status, StepStatus::Failed);
    assert_eq!(plan.steps[1].status, StepStatus::Skipped);
    assert_eq!(plan.steps[2].status, StepStatus::Succeeded);
    assert!(toolbox.invocation("B").is_none());
    assert!(matches!(
        result.result_type,
        ResultType::NeedsReplan | ResultType::Deadlock
    ));
}

#[tokio::test]
async fn independent_steps_overlap_in_time() {
    let delay = Duration::from_millis(100);
    let toolbox = Arc::new(Toolbox::with_delay(delay));
    let engine = engine(EngineConfig::default(), toolbox.clone());
    let mut plan = plan(
        "fan-out",
        vec![echo("a", &[]), echo("b", &[]), echo("c", &[]), echo("d", &[])],
    );

    let started = Instant::now();
    let result = engine
        .run(&mut plan, &ExecutionContext::default())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(result.is_complete());
    assert_eq!(toolbox.call_count(), 4);
    assert!(
        elapsed < delay * 3,
        "four independent steps took {elapsed:?}, expected roughly one delay"
    );
}

#[tokio::test]
async fn diamond_fans_in_once_both_branches_finish() {
    let toolbox = Arc::new(Toolbox::new());
    let engine = engine(EngineConfig::default(), toolbox);
    let mut plan = plan(
        "diamond",
        vec![
            PlanStep::new("base", "calculator", json!({ "expression": "6*7" })),
            PlanStep::new("left", "calculator", json!({ "expression": "{{base}}+1" }))
                .depends_on(["base"]),
            PlanStep::new("right", "calculator", json!({ "expression": "{{base}}-2" }))
                .depends_on(["base"]),
            PlanStep::new(
                "join",
                "echo",
                json!({ "pair": ["{{left}}", "{{right}}"] }),
            )
            .depends_on(["left", "right"]),
        ],
    );

    let result = engine
        .run(&mut plan, &ExecutionContext::default())
        .await
        .unwrap();

    assert!(result.is_complete());
    assert_eq!(plan.steps[3].result, Some(json!({ "pair": [43, 40] })));
}

#[tokio::test]
async fn cyclic_steps_are_reported_as_deadlock() {
    let toolbox = Arc::new(Toolbox::new());
    let engine = engine(EngineConfig::default(), toolbox.clone());
    let mut plan = plan(
        "cycle",
        vec![echo("A", &[]), echo("B", &["A", "C"]), echo("C", &["B"])],
    );

    let result = engine
        .run(&mut plan, &ExecutionContext::default())
        .await
        .unwrap();

    assert!(result.is_deadlock());
    assert!(!result.needs_replan());
    assert_eq!(result.successful_steps, vec!["A"]);
    assert_eq!(result.skipped_steps, vec!["B", "C"]);
    assert!(result.feedback.contains("dependency cycle"));
    assert_eq!(toolbox.call_count(), 1);
}

use crate::config::EngineConfig;
use crate::engine::analyzer::{OutcomeSummary, classify_outcome, outcome_feedback};
use crate::engine::gateway::{ActionInvoker, ActionResult, ArgumentResolver, PlannedAction};
use crate::engine::hooks::OperationRecord;
use crate::engine::replan::build_replan_context;
use crate::engine::resolver::TemplateArgumentResolver;
use crate::engine::signals::{ReplanBudget, apply_signals_and_budget, evaluate_signals};
use crate::engine::{ExecutedStepRecord, ExecutionContext, ExecutionResult, ResultType};
use crate::error::{GatewayError, Result};
use crate::planner::{
    ExecutionPlan, PlanStatus, PlanStep, StepStatus, ready_set, unreachable_steps,
};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Drives a plan's steps to completion and classifies the outcome.
///
/// Every ready step of a batch runs concurrently; batches run one after
/// another. All I/O goes through the two gateways.
pub struct PlanEngine {
    config: EngineConfig,
    invoker: Arc<dyn ActionInvoker>,
    resolver: Arc<dyn ArgumentResolver>,
}

/// What one attempted step produced, before it is written back to the plan.
struct StepOutcome {
    step_id: String,
    result: ActionResult,
    retry_count: u32,
    attempts: u32,
    duration: Duration,
    completed_at: DateTime<Utc>,
}

impl PlanEngine {
    pub fn new(
        config: EngineConfig,
        invoker: Arc<dyn ActionInvoker>,
        resolver: Arc<dyn ArgumentResolver>,
    ) -> Self {
        Self {
            config,
            invoker,
            resolver,
        }
    }

    /// Engine with the built-in `{{stepId.field}}` resolver.
    pub fn with_template_resolver(config: EngineConfig, invoker: Arc<dyn ActionInvoker>) -> Self {
        Self::new(config, invoker, Arc::new(TemplateArgumentResolver::new()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs `plan` until no step is ready, then classifies the result.
    ///
    /// Step failures are reported in the returned value. `Err` is reserved
    /// for a structurally invalid plan or a broken argument resolver.
    pub async fn run(
        &self,
        plan: &mut ExecutionPlan,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult> {
        plan.validate()?;

        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        reset_stale_steps(plan);
        plan.status = PlanStatus::Running;
        log_parallel_hints(plan);

        info!(
            plan_id = %plan.id,
            run_id = %run_id,
            strategy = %plan.strategy,
            steps = plan.steps.len(),
            rewoo = self.config.enable_rewoo,
            "plan run started"
        );

        let batch_limit = self.config.batch_limit();
        let mut executed = Vec::new();
        let mut cancelled = false;

        loop {
            let ready = ready_set(&plan.steps);
            if ready.is_empty() {
                break;
            }
            if ctx.is_cancelled() {
                warn!(
                    plan_id = %plan.id,
                    run_id = %run_id,
                    ready = ready.len(),
                    "run cancelled between batches"
                );
                cancelled = true;
                break;
            }

            let batch = ready.into_iter().take(batch_limit).collect::<Vec<_>>();
            debug!(plan_id = %plan.id, batch = ?batch, "ready batch");
            self.execute_batch(plan, batch, ctx, &run_id, &mut executed)
                .await?;
        }

        let unreachable = unreachable_steps(&plan.steps);
        if !unreachable.is_empty() {
            warn!(
                plan_id = %plan.id,
                skipped = ?unreachable,
                "skipping steps that can no longer run"
            );
            let index = plan.step_index();
            for step_id in &unreachable {
                if let Some(at) = index.get(step_id) {
                    plan.steps[*at].status = StepStatus::Skipped;
                }
            }
        }

        Ok(self.finish(plan, run_id, executed, started.elapsed(), cancelled))
    }

    async fn execute_batch(
        &self,
        plan: &mut ExecutionPlan,
        batch: Vec<String>,
        ctx: &ExecutionContext,
        run_id: &str,
        executed: &mut Vec<ExecutedStepRecord>,
    ) -> Result<()> {
        let index = plan.step_index();
        for step_id in &batch {
            if let Some(at) = index.get(step_id) {
                plan.steps[*at].status = StepStatus::Running;
            }
        }

        // Results written by earlier batches are frozen for this one, so
        // every resolver call reads the same view without locking.
        let snapshot = plan.steps.clone();
        let mut in_flight = batch
            .iter()
            .filter_map(|step_id| index.get(step_id).map(|at| &snapshot[*at]))
            .map(|step| self.attempt_step(step, &snapshot, ctx))
            .collect::<FuturesUnordered<_>>();

        let mut gateway_error = None;
        while let Some(outcome) = in_flight.next().await {
            match outcome {
                Ok(outcome) => apply_outcome(plan, &index, outcome, ctx, run_id, executed),
                Err(error) => {
                    gateway_error.get_or_insert(error);
                }
            }
        }

        match gateway_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn attempt_step(
        &self,
        step: &PlanStep,
        steps: &[PlanStep],
        ctx: &ExecutionContext,
    ) -> Result<StepOutcome> {
        let started = Instant::now();
        let resolved = self
            .resolver
            .resolve(&step.arguments, steps, ctx)
            .await
            .map_err(|error| GatewayError::Resolver {
                step: step.id.clone(),
                message: format!("{error:#}"),
            })?;

        // Resolution failures are not retried here: the same run cannot
        // produce different inputs.
        if !resolved.is_complete() {
            return Ok(StepOutcome {
                step_id: step.id.clone(),
                result: ActionResult::error(format!(
                    "missing inputs: {}",
                    resolved.missing.join(", ")
                )),
                retry_count: step.retry_count,
                attempts: 0,
                duration: started.elapsed(),
                completed_at: Utc::now(),
            });
        }

        let action = PlannedAction::from_step(step, resolved.args);
        let budget = step.retry_budget(self.config.max_retries);
        let mut retry_count = step.retry_count;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = self.invoke_once(&action).await;
            if let ActionResult::Error { message } = &result
                && retry_count < budget
            {
                let delay = self.config.retry_backoff(attempts - 1);
                warn!(
                    step_id = %step.id,
                    tool = %step.tool,
                    attempt = attempts,
                    error = %message,
                    retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying step after action error"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                retry_count += 1;
                continue;
            }

            return Ok(StepOutcome {
                step_id: step.id.clone(),
                result,
                retry_count,
                attempts,
                duration: started.elapsed(),
                completed_at: Utc::now(),
            });
        }
    }

    async fn invoke_once(&self, action: &PlannedAction) -> ActionResult {
        match self.config.step_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.invoker.invoke(action))
                .await
                .unwrap_or_else(|_| {
                    ActionResult::error(format!("timed out after {}s", limit.as_secs()))
                }),
            None => self.invoker.invoke(action).await,
        }
    }

    fn finish(
        &self,
        plan: &mut ExecutionPlan,
        run_id: String,
        executed: Vec<ExecutedStepRecord>,
        elapsed: Duration,
        cancelled: bool,
    ) -> ExecutionResult {
        let summary = OutcomeSummary::from_plan(plan, self.config.max_retries, cancelled);
        let tentative = classify_outcome(&summary);
        let signals = evaluate_signals(plan);
        let verdict = apply_signals_and_budget(
            tentative,
            outcome_feedback(&summary, tentative),
            &signals,
            ReplanBudget::for_plan(plan, self.config.max_replans_per_plan),
        );

        plan.metadata.replans_count = verdict.budget.used;
        plan.status = match verdict.result_type {
            ResultType::ExecutionComplete => PlanStatus::Completed,
            ResultType::NeedsReplan => PlanStatus::NeedsReplan,
            ResultType::Deadlock => PlanStatus::Deadlocked,
        };

        let replan_context = (verdict.result_type == ResultType::NeedsReplan)
            .then(|| build_replan_context(plan, &signals, cancelled));

        info!(
            plan_id = %plan.id,
            run_id = %run_id,
            result_type = %verdict.result_type,
            executed = executed.len(),
            replans_used = verdict.budget.used,
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "plan run finished"
        );

        ExecutionResult {
            result_type: verdict.result_type,
            run_id,
            plan_id: plan.id.clone(),
            strategy: plan.strategy.clone(),
            total_steps: plan.steps.len(),
            successful_steps: summary.succeeded,
            failed_steps: plan.ids_with_status(StepStatus::Failed),
            skipped_steps: summary.skipped,
            executed_steps: executed,
            execution_time: elapsed,
            feedback: verdict.feedback,
            replan_context,
            signals: signals.signals,
            has_signals_problems: verdict.has_signals_problems,
            replan_budget: verdict.budget,
            cancelled,
        }
    }
}

/// Writes one attempt back to the plan and reports it.
fn apply_outcome(
    plan: &mut ExecutionPlan,
    index: &BTreeMap<String, usize>,
    outcome: StepOutcome,
    ctx: &ExecutionContext,
    run_id: &str,
    executed: &mut Vec<ExecutedStepRecord>,
) {
    let Some(at) = index.get(&outcome.step_id).copied() else {
        return;
    };
    let plan_id = plan.id.clone();
    let step = &mut plan.steps[at];
    step.retry_count = outcome.retry_count;
    let duration_ms = u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX);

    let record = match outcome.result {
        ActionResult::ToolResult { content } => {
            info!(
                plan_id = %plan_id,
                step_id = %step.id,
                tool = %step.tool,
                duration_ms,
                "step succeeded"
            );
            step.status = StepStatus::Succeeded;
            step.result = Some(content.clone());
            step.error = None;
            ExecutedStepRecord {
                step_id: outcome.step_id,
                success: true,
                result: Some(content),
                error: None,
                attempts: outcome.attempts,
                duration: outcome.duration,
                completed_at: outcome.completed_at,
            }
        }
        ActionResult::Error { message } => {
            warn!(
                plan_id = %plan_id,
                step_id = %step.id,
                tool = %step.tool,
                optional = step.optional,
                duration_ms,
                error = %message,
                "step failed"
            );
            step.status = StepStatus::Failed;
            step.result = None;
            step.error = Some(message.clone());
            ExecutedStepRecord {
                step_id: outcome.step_id,
                success: false,
                result: None,
                error: Some(message),
                attempts: outcome.attempts,
                duration: outcome.duration,
                completed_at: outcome.completed_at,
            }
        }
    };

    ctx.record_operation(&OperationRecord {
        plan_id,
        run_id: run_id.to_string(),
        step_id: record.step_id.clone(),
        tool: step.tool.clone(),
        success: record.success,
        attempts: record.attempts,
        duration: record.duration,
    });
    executed.push(record);
}

/// Steps left `running` by an interrupted run go back to `pending`.
fn reset_stale_steps(plan: &mut ExecutionPlan) {
    for step in &mut plan.steps {
        if step.status == StepStatus::Running {
            debug!(plan_id = %plan.id, step_id = %step.id, "resetting stale running step");
            step.status = StepStatus::Pending;
        }
    }
}

/// The `parallel` flag is advisory. Report where it disagrees with what the
/// dependency graph will actually do.
fn log_parallel_hints(plan: &ExecutionPlan) {
    let index = plan.step_index();
    for layer in plan.dag().execution_layers() {
        for step_id in &layer {
            let Some(step) = index.get(step_id).map(|at| &plan.steps[*at]) else {
                continue;
            };
            if step.parallel && layer.len() == 1 {
                debug!(step_id = %step.id, "step hinted parallel but has no independent peers");
            } else if !step.parallel && layer.len() > 1 {
                debug!(step_id = %step.id, peers = layer.len() - 1, "step will run alongside peers");
            }
        }
    }
}

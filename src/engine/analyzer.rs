//! Failure & deadlock analysis.
//!
//! The boundary between `deadlock` and `needs_replan` lives in
//! [`classify_outcome`] and nowhere else.

use crate::engine::ResultType;
use crate::planner::{ExecutionPlan, StepStatus};

/// Final step states of a run, reduced to what classification needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeSummary {
    pub total: usize,
    pub succeeded: Vec<String>,
    /// Failed non-optional steps, plan order.
    pub blocking_failures: Vec<String>,
    pub optional_failures: Vec<String>,
    pub skipped: Vec<String>,
    pub pending: Vec<String>,
    /// Some failed step could still lead somewhere: it has retry budget
    /// left, or one of its dependents is not skipped.
    pub viable_continuation: bool,
    pub cycle: Option<Vec<String>>,
    pub cancelled: bool,
}

impl OutcomeSummary {
    pub fn from_plan(plan: &ExecutionPlan, default_max_retries: u32, cancelled: bool) -> Self {
        let dag = plan.dag();
        let index = plan.step_index();

        let mut summary = Self {
            total: plan.steps.len(),
            cancelled,
            ..Self::default()
        };

        for step in &plan.steps {
            match step.status {
                StepStatus::Succeeded => summary.succeeded.push(step.id.clone()),
                StepStatus::Failed if step.optional => {
                    summary.optional_failures.push(step.id.clone());
                }
                StepStatus::Failed => summary.blocking_failures.push(step.id.clone()),
                StepStatus::Skipped => summary.skipped.push(step.id.clone()),
                StepStatus::Pending | StepStatus::Running => {
                    summary.pending.push(step.id.clone());
                }
            }
        }

        summary.viable_continuation = plan
            .steps
            .iter()
            .filter(|step| step.is_blocking_failure())
            .any(|step| {
                step.has_retry_budget(default_max_retries)
                    || dag.dependents(&step.id).iter().any(|dependent| {
                        index
                            .get(dependent)
                            .is_some_and(|at| plan.steps[*at].status != StepStatus::Skipped)
                    })
            });

        if !summary.skipped.is_empty() && summary.blocking_failures.is_empty() {
            summary.cycle = dag.find_cycle();
        }

        summary
    }

    pub fn has_blocking_failures(&self) -> bool {
        !self.blocking_failures.is_empty()
    }
}

/// The deadlock-vs-replan policy.
///
/// 1. nothing failed, nothing skipped, nothing left pending → complete;
/// 2. something skipped and no failed step can lead anywhere → deadlock;
/// 3. anything else → replan.
pub fn classify_outcome(summary: &OutcomeSummary) -> ResultType {
    if !summary.has_blocking_failures() && summary.skipped.is_empty() && summary.pending.is_empty()
    {
        return ResultType::ExecutionComplete;
    }

    if !summary.skipped.is_empty() && !summary.viable_continuation {
        return ResultType::Deadlock;
    }

    ResultType::NeedsReplan
}

/// Human-readable summary for the planner.
pub fn outcome_feedback(summary: &OutcomeSummary, result_type: ResultType) -> String {
    match result_type {
        ResultType::ExecutionComplete => {
            let mut feedback = format!(
                "Executed {} of {} steps successfully",
                summary.succeeded.len(),
                summary.total
            );
            if !summary.optional_failures.is_empty() {
                feedback.push_str(&format!(
                    " ({} optional step(s) failed: {})",
                    summary.optional_failures.len(),
                    summary.optional_failures.join(", ")
                ));
            }
            feedback
        }
        ResultType::Deadlock => {
            let cause = if summary.has_blocking_failures() {
                format!("failed step(s) {}", summary.blocking_failures.join(", "))
            } else if let Some(cycle) = &summary.cycle {
                format!("dependency cycle {}", cycle.join(" -> "))
            } else {
                "unsatisfiable dependencies".to_string()
            };
            format!(
                "Plan deadlock: step(s) {} can never run because of {cause}",
                summary.skipped.join(", ")
            )
        }
        ResultType::NeedsReplan => {
            if summary.cancelled && !summary.pending.is_empty() {
                return format!(
                    "Execution cancelled with {} step(s) still pending ({}); needs replan",
                    summary.pending.len(),
                    summary.pending.join(", ")
                );
            }
            format!(
                "Execution needs replan: {} step(s) failed ({}); {} successful result(s) preserved",
                summary.blocking_failures.len(),
                summary.blocking_failures.join(", "),
                summary.succeeded.len()
            )
        }
    }
}

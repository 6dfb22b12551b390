//! ReWOO plan execution: batches of ready steps run concurrently, the
//! outcome is classified, and a replan context is built when needed.

pub mod analyzer;
mod context;
mod executor;
mod gateway;
mod hooks;
pub mod replan;
mod resolver;
mod result;
pub mod signals;

pub use analyzer::{OutcomeSummary, classify_outcome, outcome_feedback};
pub use context::ExecutionContext;
pub use executor::PlanEngine;
pub use gateway::{ActionInvoker, ActionResult, ArgumentResolver, PlannedAction, ResolvedArguments};
pub use hooks::{LogTracker, OperationRecord, OperationTracker};
pub use replan::{build_replan_context, extract_failure_patterns};
pub use resolver::{INPUT_REFERENCE, TemplateArgumentResolver};
pub use result::{
    ExecutedStepRecord, ExecutionResult, FailedStepSummary, PreservedStep, ReplanContext,
    ReplanScope, ResultType,
};
pub use signals::{
    REPLAN_LIMIT_FEEDBACK, ReplanBudget, SignalEvaluation, Verdict, apply_signals_and_budget,
    evaluate_signals,
};

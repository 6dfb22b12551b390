use crate::engine::ResultType;
use crate::planner::{ExecutionPlan, PlanSignals};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const REPLAN_LIMIT_FEEDBACK: &str = "Replan limit reached";

/// How many replans a plan lineage has used against its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplanBudget {
    pub used: u32,
    pub limit: u32,
}

impl ReplanBudget {
    pub fn new(used: u32, limit: u32) -> Self {
        Self { used, limit }
    }

    pub fn for_plan(plan: &ExecutionPlan, limit: u32) -> Self {
        Self::new(plan.metadata.replans_count, limit)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    /// Spend one replan. Returns `false` when nothing is left.
    pub fn try_consume(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.used += 1;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEvaluation {
    pub signals: Option<PlanSignals>,
    pub has_problems: bool,
}

impl SignalEvaluation {
    pub fn summary(&self) -> String {
        self.signals
            .as_ref()
            .map(PlanSignals::summary)
            .unwrap_or_default()
    }
}

pub fn evaluate_signals(plan: &ExecutionPlan) -> SignalEvaluation {
    let signals = plan.metadata.signals.clone();
    let has_problems = signals.as_ref().is_some_and(PlanSignals::has_problems);
    SignalEvaluation {
        signals,
        has_problems,
    }
}

/// Final word on a run after failure analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub result_type: ResultType,
    pub feedback: String,
    pub has_signals_problems: bool,
    pub budget: ReplanBudget,
    /// The replan was asked for by signals alone, every step having succeeded.
    pub signal_driven: bool,
    pub limit_reached: bool,
}

/// Lets signals upgrade a clean run to a replan, then charges the replan
/// budget. A replan the budget cannot pay for is downgraded to
/// `ExecutionComplete` with the problem still flagged.
pub fn apply_signals_and_budget(
    tentative: ResultType,
    feedback: String,
    signals: &SignalEvaluation,
    mut budget: ReplanBudget,
) -> Verdict {
    let mut result_type = tentative;
    let mut feedback = feedback;
    let mut signal_driven = false;

    if signals.has_problems {
        match result_type {
            ResultType::ExecutionComplete => {
                result_type = ResultType::NeedsReplan;
                signal_driven = true;
                feedback = format!(
                    "All steps completed but plan signals report unresolved problems: {}",
                    signals.summary()
                );
            }
            ResultType::NeedsReplan => {
                feedback = format!("{feedback}; signals: {}", signals.summary());
            }
            ResultType::Deadlock => {}
        }
    }

    let mut limit_reached = false;
    if result_type == ResultType::NeedsReplan && !budget.try_consume() {
        warn!(
            used = budget.used,
            limit = budget.limit,
            "replan limit reached, completing with unresolved problems"
        );
        result_type = ResultType::ExecutionComplete;
        limit_reached = true;
        feedback = format!(
            "{REPLAN_LIMIT_FEEDBACK} ({}/{}); stopping with unresolved problems. {feedback}",
            budget.used, budget.limit
        );
    }

    Verdict {
        result_type,
        feedback,
        has_signals_problems: signals.has_problems || limit_reached,
        budget,
        signal_driven,
        limit_reached,
    }
}

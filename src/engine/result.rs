use crate::engine::signals::ReplanBudget;
use crate::planner::PlanSignals;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResultType {
    ExecutionComplete,
    NeedsReplan,
    Deadlock,
}

/// One attempted step. Appended in completion order and never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedStepRecord {
    pub step_id: String,
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub attempts: u32,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
}

/// A successful step whose result the next plan may reuse as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreservedStep {
    pub step_id: String,
    pub tool: String,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedStepSummary {
    pub step_id: String,
    pub tool: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplanScope {
    pub successful_steps: Vec<String>,
    pub failed_steps: Vec<FailedStepSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplanContext {
    pub preserved_steps: Vec<PreservedStep>,
    pub failure_patterns: Vec<String>,
    pub primary_cause: String,
    pub suggested_strategy: String,
    pub context_for_replan: ReplanScope,
}

/// The single value a run hands back to the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(rename = "type")]
    pub result_type: ResultType,
    pub run_id: String,
    pub plan_id: String,
    pub strategy: String,
    pub total_steps: usize,
    pub successful_steps: Vec<String>,
    pub failed_steps: Vec<String>,
    pub skipped_steps: Vec<String>,
    pub executed_steps: Vec<ExecutedStepRecord>,
    #[serde(with = "duration_ms")]
    pub execution_time: Duration,
    pub feedback: String,
    pub replan_context: Option<ReplanContext>,
    pub signals: Option<PlanSignals>,
    pub has_signals_problems: bool,
    pub replan_budget: ReplanBudget,
    pub cancelled: bool,
}

impl ExecutionResult {
    pub fn is_complete(&self) -> bool {
        self.result_type == ResultType::ExecutionComplete
    }

    pub fn needs_replan(&self) -> bool {
        self.result_type == ResultType::NeedsReplan
    }

    pub fn is_deadlock(&self) -> bool {
        self.result_type == ResultType::Deadlock
    }

    /// Complete and nothing left unresolved, including a hit replan limit.
    pub fn is_clean(&self) -> bool {
        self.is_complete() && !self.has_signals_problems
    }

    pub fn record(&self, step_id: &str) -> Option<&ExecutedStepRecord> {
        self.executed_steps
            .iter()
            .find(|record| record.step_id == step_id)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

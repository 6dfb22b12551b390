use crate::error::{PlanError, Result};
use crate::planner::DagContract;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_ACTION_TYPE: &str = "tool_call";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Pending,
    Running,
    Completed,
    NeedsReplan,
    Deadlocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_action_type")]
    pub action_type: String,
    pub tool: String,
    /// Raw arguments. Strings may carry `{{stepId.field}}` back-references.
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(default)]
    pub status: StepStatus,
    /// A failed optional step neither blocks its dependents nor fails the plan.
    #[serde(default)]
    pub optional: bool,
    /// Author hint only; scheduling never reads it.
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub retry_count: u32,
    /// Overrides the engine-wide retry budget when set.
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_action_type() -> String {
    DEFAULT_ACTION_TYPE.to_string()
}

impl PlanStep {
    pub fn new(id: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        let id = id.into();
        let tool = tool.into();
        Self {
            description: format!("{tool} ({id})"),
            id,
            action_type: default_action_type(),
            tool,
            arguments,
            dependencies: BTreeSet::new(),
            status: StepStatus::Pending,
            optional: false,
            parallel: false,
            retry_count: 0,
            max_retries: None,
            result: None,
            error: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_status(mut self, status: StepStatus) -> Self {
        self.status = status;
        self
    }

    /// Retry budget for this step given the engine default.
    pub fn retry_budget(&self, default_max_retries: u32) -> u32 {
        self.max_retries.unwrap_or(default_max_retries)
    }

    pub fn has_retry_budget(&self, default_max_retries: u32) -> bool {
        self.retry_count < self.retry_budget(default_max_retries)
    }

    /// Whether downstream steps may treat this step as done.
    pub fn satisfies_dependents(&self) -> bool {
        match self.status {
            StepStatus::Succeeded => true,
            StepStatus::Failed | StepStatus::Skipped => self.optional,
            StepStatus::Pending | StepStatus::Running => false,
        }
    }

    /// A failure that counts against the plan outcome.
    pub fn is_blocking_failure(&self) -> bool {
        self.status == StepStatus::Failed && !self.optional
    }
}

/// Planner-supplied hints that an executed plan still falls short of its goal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSignals {
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default)]
    pub suggested_next_step: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub no_discovery_path: Vec<String>,
}

impl PlanSignals {
    pub fn has_problems(&self) -> bool {
        !self.needs.is_empty()
            || self
                .suggested_next_step
                .as_deref()
                .is_some_and(|step| !step.trim().is_empty())
            || !self.errors.is_empty()
            || !self.no_discovery_path.is_empty()
    }

    /// One-line digest used in feedback and replan causes.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.needs.is_empty() {
            parts.push(format!("needs [{}]", self.needs.join(", ")));
        }
        if let Some(next) = self
            .suggested_next_step
            .as_deref()
            .filter(|step| !step.trim().is_empty())
        {
            parts.push(format!("suggested next step '{next}'"));
        }
        if !self.errors.is_empty() {
            parts.push(format!("errors [{}]", self.errors.join(", ")));
        }
        if !self.no_discovery_path.is_empty() {
            parts.push(format!(
                "no discovery path for [{}]",
                self.no_discovery_path.join(", ")
            ));
        }
        parts.join("; ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    #[serde(default)]
    pub signals: Option<PlanSignals>,
    /// Owned by the engine; callers persist it between runs.
    #[serde(default)]
    pub replans_count: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub reasoning: String,
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub metadata: PlanMetadata,
}

impl ExecutionPlan {
    pub fn new(
        id: impl Into<String>,
        strategy: impl Into<String>,
        steps: Vec<PlanStep>,
    ) -> Result<Self> {
        let plan = Self {
            id: id.into(),
            strategy: strategy.into(),
            goal: String::new(),
            reasoning: String::new(),
            steps,
            status: PlanStatus::Pending,
            metadata: PlanMetadata::default(),
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_signals(mut self, signals: PlanSignals) -> Self {
        self.metadata.signals = Some(signals);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty {
                plan_id: self.id.clone(),
            }
            .into());
        }
        self.dag().validate()?;
        Ok(())
    }

    pub fn dag(&self) -> DagContract {
        DagContract::from_steps(&self.steps)
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn step_index(&self) -> BTreeMap<String, usize> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| (step.id.clone(), index))
            .collect()
    }

    /// Ids with the given status, in plan order.
    pub fn ids_with_status(&self, status: StepStatus) -> Vec<String> {
        self.steps
            .iter()
            .filter(|step| step.status == status)
            .map(|step| step.id.clone())
            .collect()
    }

    pub fn signals(&self) -> PlanSignals {
        self.metadata.signals.clone().unwrap_or_default()
    }
}

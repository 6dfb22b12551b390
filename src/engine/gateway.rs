use crate::engine::ExecutionContext;
use crate::planner::PlanStep;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one action invocation. Never partially filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionResult {
    ToolResult { content: Value },
    Error { message: String },
}

impl ActionResult {
    pub fn tool_result(content: impl Into<Value>) -> Self {
        Self::ToolResult {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }
}

/// A step with its arguments resolved, ready to hand to an invoker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub step_id: String,
    pub action_type: String,
    pub tool: String,
    pub arguments: Value,
}

impl PlannedAction {
    pub fn from_step(step: &PlanStep, arguments: Value) -> Self {
        Self {
            step_id: step.id.clone(),
            action_type: step.action_type.clone(),
            tool: step.tool.clone(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedArguments {
    pub args: Value,
    /// References that could not be resolved, e.g. `fetch.body`.
    pub missing: Vec<String>,
}

impl ResolvedArguments {
    pub fn complete(args: Value) -> Self {
        Self {
            args,
            missing: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Executes one concrete action. Called concurrently for independent steps.
#[async_trait]
pub trait ActionInvoker: Send + Sync {
    async fn invoke(&self, action: &PlannedAction) -> ActionResult;
}

/// Resolves a step's raw arguments against earlier results.
///
/// Returning `Err` means the resolver itself is broken and aborts the run;
/// an unsatisfiable reference belongs in [`ResolvedArguments::missing`].
#[async_trait]
pub trait ArgumentResolver: Send + Sync {
    async fn resolve(
        &self,
        raw_args: &Value,
        steps: &[PlanStep],
        ctx: &ExecutionContext,
    ) -> anyhow::Result<ResolvedArguments>;
}

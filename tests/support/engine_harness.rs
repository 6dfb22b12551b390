#![allow(dead_code)]

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};

use rewoo_engine::engine::{ActionInvoker, ActionResult, PlannedAction};
use rewoo_engine::{EngineConfig, ExecutionPlan, PlanEngine, PlanStep};

/// One call the toolbox served, with wall-clock bounds.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub step_id: String,
    pub tool: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Small fake tool surface:
///
/// - `calculator` evaluates `{"expression": "a<op>b"}`
/// - `email_sender` rejects a `to` that is not `user@host.tld`
/// - `echo` returns its arguments
/// - `fail` returns `{"message": ...}` as an error
#[derive(Default)]
pub struct Toolbox {
    delay: Duration,
    log: Mutex<Vec<Invocation>>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().unwrap().clone()
    }

    pub fn invocation(&self, step_id: &str) -> Option<Invocation> {
        self.invocations()
            .into_iter()
            .find(|call| call.step_id == step_id)
    }

    pub fn call_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

#[async_trait]
impl ActionInvoker for Toolbox {
    async fn invoke(&self, action: &PlannedAction) -> ActionResult {
        let started = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match action.tool.as_str() {
            "calculator" => calculate(&action.arguments),
            "email_sender" => send_email(&action.arguments),
            "echo" => ActionResult::tool_result(action.arguments.clone()),
            "fail" => ActionResult::error(
                action.arguments["message"]
                    .as_str()
                    .unwrap_or("failed")
                    .to_string(),
            ),
            other => ActionResult::error(format!("unknown tool: {other}")),
        };

        self.log.lock().unwrap().push(Invocation {
            step_id: action.step_id.clone(),
            tool: action.tool.clone(),
            started,
            finished: Instant::now(),
        });
        result
    }
}

fn calculate(arguments: &Value) -> ActionResult {
    let Some(expression) = arguments["expression"].as_str() else {
        return ActionResult::error("missing expression");
    };
    let expression = expression.replace(' ', "");
    let Some(at) = expression
        .char_indices()
        .skip(1)
        .find(|(_, c)| matches!(c, '+' | '-' | '*' | '/'))
        .map(|(at, _)| at)
    else {
        return ActionResult::error(format!("invalid expression: {expression}"));
    };

    let (lhs, rhs) = (&expression[..at], &expression[at + 1..]);
    let (Ok(lhs), Ok(rhs)) = (lhs.parse::<f64>(), rhs.parse::<f64>()) else {
        return ActionResult::error(format!("invalid expression: {expression}"));
    };
    let value = match &expression[at..=at] {
        "+" => lhs + rhs,
        "-" => lhs - rhs,
        "*" => lhs * rhs,
        _ if rhs == 0.0 => return ActionResult::error("division by zero"),
        _ => lhs / rhs,
    };

    #[allow(clippy::cast_possible_truncation)]
    let value = if value.fract() == 0.0 {
        json!(value as i64)
    } else {
        json!(value)
    };
    ActionResult::tool_result(value)
}

fn send_email(arguments: &Value) -> ActionResult {
    let to = arguments["to"].as_str().unwrap_or_default();
    let valid = to
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
    if !valid {
        return ActionResult::error("Invalid email address");
    }
    ActionResult::tool_result(json!({ "delivered_to": to, "body": arguments["body"] }))
}

pub fn engine(config: EngineConfig, toolbox: std::sync::Arc<Toolbox>) -> PlanEngine {
    PlanEngine::with_template_resolver(config, toolbox)
}

pub fn plan(id: &str, steps: Vec<PlanStep>) -> ExecutionPlan {
    ExecutionPlan::new(id, "parallel-first", steps).unwrap()
}

pub fn echo(id: &str, deps: &[&str]) -> PlanStep {
    PlanStep::new(id, "echo", json!({ "step": id })).depends_on(deps.iter().copied())
}

pub fn failing(id: &str, message: &str) -> PlanStep {
    PlanStep::new(id, "fail", json!({ "message": message }))
}

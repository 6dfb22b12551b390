use crate::engine::ExecutionContext;
use crate::engine::gateway::{ArgumentResolver, ResolvedArguments};
use crate::planner::{PlanStep, StepStatus};
use async_trait::async_trait;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::LazyLock;

static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+)((?:\.[A-Za-z0-9_\-]+)*)\s*\}\}")
        .expect("template pattern is valid")
});

/// Name that resolves to the run's input text unless a step claims it.
pub const INPUT_REFERENCE: &str = "input";

/// Resolves `{{stepId}}`, `{{stepId.field.sub}}`, `{{stepId.items.0}}` and
/// `{{input}}` inside argument strings.
///
/// A string holding exactly one reference takes the referenced JSON value
/// as-is; references embedded in longer text are interpolated.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateArgumentResolver;

impl TemplateArgumentResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve_value(
        &self,
        raw: &Value,
        steps: &[PlanStep],
        ctx: &ExecutionContext,
    ) -> ResolvedArguments {
        let mut missing = Vec::new();
        let args = resolve_node(raw, steps, ctx, &mut missing);
        ResolvedArguments { args, missing }
    }
}

#[async_trait]
impl ArgumentResolver for TemplateArgumentResolver {
    async fn resolve(
        &self,
        raw_args: &Value,
        steps: &[PlanStep],
        ctx: &ExecutionContext,
    ) -> anyhow::Result<ResolvedArguments> {
        Ok(self.resolve_value(raw_args, steps, ctx))
    }
}

fn resolve_node(
    raw: &Value,
    steps: &[PlanStep],
    ctx: &ExecutionContext,
    missing: &mut Vec<String>,
) -> Value {
    match raw {
        Value::String(text) => resolve_string(text, steps, ctx, missing),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_node(item, steps, ctx, missing))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), resolve_node(value, steps, ctx, missing)))
                .collect::<Map<_, _>>(),
        ),
        other => other.clone(),
    }
}

fn resolve_string(
    text: &str,
    steps: &[PlanStep],
    ctx: &ExecutionContext,
    missing: &mut Vec<String>,
) -> Value {
    if let Some(whole) = TEMPLATE.captures(text) {
        let span = whole.get(0).map(|m| m.range());
        if span == Some(0..text.len()) {
            return match lookup(&whole, steps, ctx) {
                Some(value) => value,
                None => {
                    note_missing(missing, reference_label(&whole));
                    Value::String(text.to_string())
                }
            };
        }
    }

    let interpolated = TEMPLATE.replace_all(text, |caps: &Captures<'_>| {
        match lookup(caps, steps, ctx) {
            Some(Value::String(s)) => s,
            Some(value) => value.to_string(),
            None => {
                note_missing(missing, reference_label(caps));
                caps[0].to_string()
            }
        }
    });
    Value::String(interpolated.into_owned())
}

fn lookup(caps: &Captures<'_>, steps: &[PlanStep], ctx: &ExecutionContext) -> Option<Value> {
    let step_id = &caps[1];
    let path = caps.get(2).map_or("", |m| m.as_str());

    let root = match steps.iter().find(|step| step.id == step_id) {
        Some(step) if step.status == StepStatus::Succeeded => step.result.clone()?,
        Some(_) => return None,
        None if step_id == INPUT_REFERENCE => Value::String(ctx.input.clone()),
        None => return None,
    };

    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(root, |current, segment| match current {
            Value::Object(mut fields) => fields.remove(segment),
            Value::Array(mut items) => {
                let index = segment.parse::<usize>().ok()?;
                (index < items.len()).then(|| items.swap_remove(index))
            }
            _ => None,
        })
}

/// Each reference is reported once, in first-seen order.
fn note_missing(missing: &mut Vec<String>, label: String) {
    if !missing.contains(&label) {
        missing.push(label);
    }
}

fn reference_label(caps: &Captures<'_>) -> String {
    format!("{}{}", &caps[1], caps.get(2).map_or("", |m| m.as_str()))
}

use crate::engine::result::{FailedStepSummary, PreservedStep, ReplanContext, ReplanScope};
use crate::engine::signals::SignalEvaluation;
use crate::planner::{ExecutionPlan, StepStatus};

const MAX_PATTERN_KEYWORDS: usize = 4;

const STOP_WORDS: [&str; 16] = [
    "the", "and", "for", "was", "with", "from", "this", "that", "are", "has", "have", "been",
    "into", "while", "could", "would",
];

/// Families of failure text worth a stable tag, checked in order.
const FAILURE_CATEGORIES: [(&str, &[&str]); 7] = [
    ("missing_inputs", &["missing input"]),
    ("timeout", &["timed out", "timeout"]),
    ("not_found", &["not found", "no such", "404"]),
    (
        "permission_denied",
        &["permission", "forbidden", "unauthorized", "denied"],
    ),
    ("rate_limited", &["rate limit", "too many requests", "429"]),
    ("invalid_input", &["invalid", "malformed", "validation"]),
    (
        "network_error",
        &["connection", "network", "unreachable", "dns"],
    ),
];

/// Builds the context the planner needs to revise a plan: reusable results,
/// what went wrong, and where to go next.
pub fn build_replan_context(
    plan: &ExecutionPlan,
    signals: &SignalEvaluation,
    cancelled: bool,
) -> ReplanContext {
    let preserved_steps = plan
        .steps
        .iter()
        .filter(|step| step.status == StepStatus::Succeeded)
        .map(|step| PreservedStep {
            step_id: step.id.clone(),
            tool: step.tool.clone(),
            result: step.result.clone().unwrap_or_default(),
        })
        .collect::<Vec<_>>();

    let failed_steps = plan
        .steps
        .iter()
        .filter(|step| step.is_blocking_failure())
        .map(|step| FailedStepSummary {
            step_id: step.id.clone(),
            tool: step.tool.clone(),
            error: step
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        })
        .collect::<Vec<_>>();

    let mut messages = failed_steps
        .iter()
        .map(|failed| failed.error.as_str())
        .collect::<Vec<_>>();
    if let Some(signal_set) = &signals.signals {
        messages.extend(signal_set.errors.iter().map(String::as_str));
    }
    let failure_patterns = extract_failure_patterns(messages);

    let signal_only = failed_steps.is_empty() && signals.has_problems;
    let primary_cause = if let Some(first) = failed_steps.first() {
        format!("{}: {}", first.step_id, first.error)
    } else if cancelled {
        "cancelled".to_string()
    } else if signal_only {
        format!("signals: {}", signals.summary())
    } else {
        "unknown".to_string()
    };

    ReplanContext {
        suggested_strategy: suggest_strategy(&failure_patterns, signal_only).to_string(),
        context_for_replan: ReplanScope {
            successful_steps: preserved_steps
                .iter()
                .map(|preserved| preserved.step_id.clone())
                .collect(),
            failed_steps,
        },
        preserved_steps,
        failure_patterns,
        primary_cause,
    }
}

/// Normalized keyword strings plus category tags, de-duplicated in order.
///
/// `"Invalid email address"` yields `invalid_email_address` and
/// `invalid_input`.
pub fn extract_failure_patterns<'a, I>(messages: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut patterns: Vec<String> = Vec::new();
    let mut push = |pattern: String| {
        if !pattern.is_empty() && !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    };

    for message in messages {
        let lowered = message.to_lowercase();
        let keywords = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| token.chars().count() >= 3 && !STOP_WORDS.contains(token))
            .take(MAX_PATTERN_KEYWORDS)
            .collect::<Vec<_>>();
        push(keywords.join("_"));

        for (tag, needles) in FAILURE_CATEGORIES {
            if needles.iter().any(|needle| lowered.contains(needle)) {
                push(tag.to_string());
            }
        }
    }

    patterns
}

fn suggest_strategy(patterns: &[String], signal_only: bool) -> &'static str {
    let has = |tag: &str| patterns.iter().any(|pattern| pattern == tag);

    if has("missing_inputs") {
        "gather_missing_inputs"
    } else if has("timeout") || has("network_error") || has("rate_limited") {
        "retry_with_backoff"
    } else if has("invalid_input") {
        "correct_arguments"
    } else if has("not_found") || has("permission_denied") {
        "use_alternative_tool"
    } else if signal_only {
        "address_signals"
    } else {
        "revise_failed_steps"
    }
}

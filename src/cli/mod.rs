pub mod commands;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rewoo_engine::engine::{ActionInvoker, ActionResult, LogTracker, PlannedAction};
use rewoo_engine::{EngineConfig, ExecutionContext, ExecutionPlan, PlanEngine};
use std::path::Path;
use std::sync::Arc;

pub use commands::{Cli, Commands};

pub async fn dispatch(command: Commands, config: EngineConfig) -> Result<()> {
    match command {
        Commands::Check { plan } => check(&plan),
        Commands::DryRun { plan, input } => dry_run(&plan, &input, config).await,
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn read_plan(path: &Path) -> Result<ExecutionPlan> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan file {}", path.display()))?;
    let plan: ExecutionPlan = serde_json::from_str(&raw).context("Failed to parse plan")?;
    plan.validate()?;
    Ok(plan)
}

fn check(path: &Path) -> Result<()> {
    let plan = read_plan(path)?;
    let dag = plan.dag();

    println!("plan {} ({} steps)", plan.id, plan.steps.len());
    for (depth, layer) in dag.execution_layers().iter().enumerate() {
        println!("  batch {}: {}", depth + 1, layer.join(", "));
    }
    if let Some(cycle) = dag.find_cycle() {
        println!("  cycle: {} (these steps can never run)", cycle.join(" -> "));
    }
    Ok(())
}

/// Succeeds every action with its resolved arguments.
struct EchoInvoker;

#[async_trait]
impl ActionInvoker for EchoInvoker {
    async fn invoke(&self, action: &PlannedAction) -> ActionResult {
        ActionResult::tool_result(action.arguments.clone())
    }
}

async fn dry_run(path: &Path, input: &str, config: EngineConfig) -> Result<()> {
    let mut plan = read_plan(path)?;
    let engine = PlanEngine::with_template_resolver(config, Arc::new(EchoInvoker));
    let ctx = ExecutionContext::new(input).with_tracker(Arc::new(LogTracker::new()));

    let result = engine.run(&mut plan, &ctx).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

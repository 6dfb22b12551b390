#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod engine;
pub mod error;
pub mod planner;

pub use config::EngineConfig;
pub use engine::{
    ActionInvoker, ActionResult, ArgumentResolver, ExecutionContext, ExecutionResult, PlanEngine,
    PlannedAction, ResultType,
};
pub use error::{EngineError, Result};
pub use planner::{ExecutionPlan, PlanStep, StepStatus};

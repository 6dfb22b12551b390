mod dag_contract;
mod types;

pub use dag_contract::{DagContract, DagEdge, DagNode, ready_set, unreachable_steps};
pub use types::{
    DEFAULT_ACTION_TYPE, ExecutionPlan, PlanMetadata, PlanSignals, PlanStatus, PlanStep,
    StepStatus,
};

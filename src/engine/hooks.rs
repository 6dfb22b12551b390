use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// What the engine reports to trackers after each attempted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    pub plan_id: String,
    pub run_id: String,
    pub step_id: String,
    pub tool: String,
    pub success: bool,
    pub attempts: u32,
    pub duration: Duration,
}

/// Caller-supplied hook. The engine calls it but never interprets it.
pub trait OperationTracker: Send + Sync {
    fn record_operation(&self, record: &OperationRecord);
}

/// Tracker that writes each record to the `tracing` log.
pub struct LogTracker;

impl LogTracker {
    pub fn new() -> Self {
        Self
    }
}

impl OperationTracker for LogTracker {
    fn record_operation(&self, record: &OperationRecord) {
        let ms = u64::try_from(record.duration.as_millis()).unwrap_or(u64::MAX);
        info!(
            plan_id = %record.plan_id,
            run_id = %record.run_id,
            step_id = %record.step_id,
            tool = %record.tool,
            success = record.success,
            attempts = record.attempts,
            duration_ms = ms,
            "operation.step"
        );
    }
}

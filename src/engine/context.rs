use crate::engine::hooks::{OperationRecord, OperationTracker};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Read-only state shared by every step of a run.
///
/// Steps see it through `&ExecutionContext`; nothing in a batch mutates it.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    pub input: String,
    pub history: Vec<String>,
    pub iteration: u32,
    pub cancellation: CancellationToken,
    trackers: Vec<Arc<dyn OperationTracker>>,
}

impl ExecutionContext {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.history = history;
        self
    }

    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = iteration;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn OperationTracker>) -> Self {
        self.trackers.push(tracker);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub(crate) fn record_operation(&self, record: &OperationRecord) {
        for tracker in &self.trackers {
            tracker.record_operation(record);
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("input", &self.input)
            .field("history", &self.history.len())
            .field("iteration", &self.iteration)
            .field("cancelled", &self.is_cancelled())
            .field("trackers", &self.trackers.len())
            .finish()
    }
}

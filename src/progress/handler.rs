//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while a mapping workflow runs
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Map run started over `total_rows` input rows
    RunStarted { run_id: String, total_rows: usize },

    RowStarted { index: usize },

    RowSucceeded {
        index: usize,
        code: String,
        duration: Duration,
    },

    RowFailed {
        index: usize,
        stage: String,
        error: String,
    },

    /// All rows finished and the manifest is written
    RunCompleted {
        run_id: String,
        succeeded: usize,
        failed: usize,
        status: String,
        duration: Duration,
    },

    PhaseStarted { phase: String },

    PhaseComplete { phase: String, duration: Duration },

    /// Workflow finished every phase
    Completed { total_time: Duration },

    Failed { error: String },
}

/// Trait for handling progress events
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

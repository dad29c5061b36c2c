//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, error, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { run_id, total_rows } => {
                info!(run_id = %run_id, rows = total_rows, "Starting map run");
            }
            ProgressEvent::RowStarted { index } => {
                debug!(row = index, "Row started");
            }
            ProgressEvent::RowSucceeded {
                index,
                code,
                duration,
            } => {
                debug!(
                    row = index,
                    code = %code,
                    duration_ms = duration.as_millis() as u64,
                    "Row mapped"
                );
            }
            ProgressEvent::RowFailed {
                index,
                stage,
                error,
            } => {
                warn!(row = index, stage = %stage, error = %error, "Row failed");
            }
            ProgressEvent::RunCompleted {
                run_id,
                succeeded,
                failed,
                status,
                duration,
            } => {
                if status == "FAILED" {
                    warn!(
                        run_id = %run_id,
                        succeeded,
                        failed,
                        duration_ms = duration.as_millis() as u64,
                        "Map run failed: tolerated failure threshold exceeded"
                    );
                } else {
                    info!(
                        run_id = %run_id,
                        succeeded,
                        failed,
                        duration_ms = duration.as_millis() as u64,
                        "Map run complete"
                    );
                }
            }
            ProgressEvent::PhaseStarted { phase } => {
                info!(phase = %phase, "Starting phase");
            }
            ProgressEvent::PhaseComplete { phase, duration } => {
                info!(
                    phase = %phase,
                    duration_ms = duration.as_millis() as u64,
                    "Phase complete"
                );
            }
            ProgressEvent::Completed { total_time } => {
                info!(
                    total_time_ms = total_time.as_millis() as u64,
                    "Workflow complete"
                );
            }
            ProgressEvent::Failed { error } => {
                error!(error = %error, "Workflow failed");
            }
        }
    }
}

use super::context::WorkflowContext;
use super::mapper::MapperError;
use super::merge::MergeError;
use super::reconciler::ReconcileError;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Map(#[from] MapperError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Too many rows failed. Reconciliation and merge never run.
    #[error("Map run {run_id} failed: {failed} of {total} rows failed (manifest {manifest_key})")]
    RunFailed {
        run_id: String,
        failed: usize,
        total: usize,
        manifest_key: String,
    },

    #[error("Phase {phase} requires {missing}")]
    MissingState {
        phase: &'static str,
        missing: &'static str,
    },
}

impl WorkflowError {
    pub fn is_run_failure(&self) -> bool {
        matches!(
            self,
            WorkflowError::RunFailed { .. }
                | WorkflowError::Reconcile(ReconcileError::RunFailed { .. })
        )
    }
}

#[async_trait]
pub trait WorkflowPhase: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, context: &mut WorkflowContext) -> Result<(), WorkflowError>;
}

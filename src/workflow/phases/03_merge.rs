use crate::workflow::context::WorkflowContext;
use crate::workflow::merge::MergeJob;
use crate::workflow::phase_trait::{WorkflowError, WorkflowPhase};
use async_trait::async_trait;

pub struct MergePhase {
    job: MergeJob,
}

impl MergePhase {
    pub fn new(job: MergeJob) -> Self {
        Self { job }
    }
}

#[async_trait]
impl WorkflowPhase for MergePhase {
    fn name(&self) -> &'static str {
        "MergePhase"
    }

    async fn execute(&self, context: &mut WorkflowContext) -> Result<(), WorkflowError> {
        if context.reconcile.is_none() {
            return Err(WorkflowError::MissingState {
                phase: "MergePhase",
                missing: "a reconciled run",
            });
        }
        context.merge = Some(self.job.run().await?);
        Ok(())
    }
}

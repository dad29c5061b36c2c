use crate::model::RunStatus;
use crate::workflow::context::WorkflowContext;
use crate::workflow::mapper::DistributedMapper;
use crate::workflow::phase_trait::{WorkflowError, WorkflowPhase};
use async_trait::async_trait;
use tracing::warn;

pub struct MapPhase {
    mapper: DistributedMapper,
}

impl MapPhase {
    pub fn new(mapper: DistributedMapper) -> Self {
        Self { mapper }
    }
}

#[async_trait]
impl WorkflowPhase for MapPhase {
    fn name(&self) -> &'static str {
        "MapPhase"
    }

    async fn execute(&self, context: &mut WorkflowContext) -> Result<(), WorkflowError> {
        let summary = self.mapper.run(&context.input_key).await?;
        let status = summary.status;
        context.map = Some(summary.clone());

        if status == RunStatus::Failed {
            warn!(
                run_id = %summary.run_id,
                failed = summary.failed,
                total = summary.total_rows,
                "Failure threshold exceeded; skipping reconcile and merge"
            );
            return Err(WorkflowError::RunFailed {
                run_id: summary.run_id,
                failed: summary.failed,
                total: summary.total_rows,
                manifest_key: summary.manifest_key,
            });
        }
        Ok(())
    }
}

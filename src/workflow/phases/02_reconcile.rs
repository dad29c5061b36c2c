use crate::workflow::context::WorkflowContext;
use crate::workflow::phase_trait::{WorkflowError, WorkflowPhase};
use crate::workflow::reconciler::ResultReconciler;
use async_trait::async_trait;

pub struct ReconcilePhase {
    reconciler: ResultReconciler,
}

impl ReconcilePhase {
    pub fn new(reconciler: ResultReconciler) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl WorkflowPhase for ReconcilePhase {
    fn name(&self) -> &'static str {
        "ReconcilePhase"
    }

    async fn execute(&self, context: &mut WorkflowContext) -> Result<(), WorkflowError> {
        let manifest_key = context
            .manifest_key()
            .ok_or(WorkflowError::MissingState {
                phase: "ReconcilePhase",
                missing: "a completed map run",
            })?
            .to_string();

        let summary = self.reconciler.reconcile(&manifest_key).await?;
        context.reconcile = Some(summary);
        Ok(())
    }
}

use super::context::WorkflowContext;
use super::mapper::DistributedMapper;
use super::merge::MergeJob;
use super::phase_trait::{WorkflowError, WorkflowPhase};
use super::phases::{MapPhase, MergePhase, ReconcilePhase};
use super::reconciler::ResultReconciler;
use crate::progress::{ProgressEvent, ProgressHandler};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs workflow phases in order over one shared context. The first failing
/// phase stops the workflow.
pub struct MappingWorkflow {
    phases: Vec<Box<dyn WorkflowPhase>>,
    progress: Arc<dyn ProgressHandler>,
}

impl MappingWorkflow {
    pub fn new(phases: Vec<Box<dyn WorkflowPhase>>, progress: Arc<dyn ProgressHandler>) -> Self {
        Self { phases, progress }
    }

    /// map → reconcile → merge
    pub fn standard(
        mapper: DistributedMapper,
        reconciler: ResultReconciler,
        merge: MergeJob,
        progress: Arc<dyn ProgressHandler>,
    ) -> Self {
        Self::new(
            vec![
                Box::new(MapPhase::new(mapper)),
                Box::new(ReconcilePhase::new(reconciler)),
                Box::new(MergePhase::new(merge)),
            ],
            progress,
        )
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|p| p.name()).collect()
    }

    pub async fn execute(&self, context: &mut WorkflowContext) -> Result<(), WorkflowError> {
        let start = Instant::now();
        info!("Starting mapping workflow for: {}", context.input_key);

        for phase in &self.phases {
            let phase_name = phase.name();
            info!("Phase: {}", phase_name);
            self.progress.on_progress(&ProgressEvent::PhaseStarted {
                phase: phase_name.to_string(),
            });

            let phase_start = Instant::now();
            if let Err(e) = phase.execute(context).await {
                self.progress.on_progress(&ProgressEvent::Failed {
                    error: format!("Phase {} failed: {}", phase_name, e),
                });
                return Err(e);
            }

            self.progress.on_progress(&ProgressEvent::PhaseComplete {
                phase: phase_name.to_string(),
                duration: phase_start.elapsed(),
            });
            debug!("Phase {} complete", phase_name);
        }

        self.progress.on_progress(&ProgressEvent::Completed {
            total_time: start.elapsed(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoOpHandler;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingPhase {
        name: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl WorkflowPhase for RecordingPhase {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn execute(&self, _context: &mut WorkflowContext) -> Result<(), WorkflowError> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(WorkflowError::RunFailed {
                    run_id: "r".to_string(),
                    failed: 2,
                    total: 3,
                    manifest_key: "mapping-runs/r/manifest.json".to_string(),
                });
            }
            Ok(())
        }
    }

    fn phase(
        name: &'static str,
        fail: bool,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Box<dyn WorkflowPhase> {
        Box::new(RecordingPhase {
            name,
            fail,
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn test_phases_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let workflow = MappingWorkflow::new(
            vec![phase("a", false, &log), phase("b", false, &log)],
            Arc::new(NoOpHandler),
        );

        workflow
            .execute(&mut WorkflowContext::new("in.csv"))
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(workflow.phase_names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_failed_phase_stops_workflow() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let workflow = MappingWorkflow::new(
            vec![
                phase("map", true, &log),
                phase("reconcile", false, &log),
                phase("merge", false, &log),
            ],
            Arc::new(NoOpHandler),
        );

        let err = workflow
            .execute(&mut WorkflowContext::new("in.csv"))
            .await
            .unwrap_err();

        assert!(err.is_run_failure());
        assert_eq!(*log.lock().unwrap(), vec!["map"]);
    }
}

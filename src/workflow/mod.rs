//! Dataset-level workflow
//!
//! The distributed mapper runs the record processor over every input row
//! and writes an execution manifest. The reconciler relocates successful
//! rows into a fixed area. The merge job joins them with the emission-factor
//! table. [`MappingWorkflow`] chains the three and stops after a failed map
//! run.

pub mod context;
pub mod mapper;
pub mod merge;
pub mod orchestrator;
pub mod phase_trait;
pub mod phases;
pub mod reconciler;

pub use context::WorkflowContext;
pub use mapper::{
    manifest_key, parse_input_csv, row_artifact_key, DistributedMapper, MapRunSummary,
    MapperError, MapperSettings, STORE_STAGE,
};
pub use merge::{MergeError, MergeJob, MergeSummary, MATCHED_KEY, MISMATCHED_KEY};
pub use orchestrator::MappingWorkflow;
pub use phase_trait::{WorkflowError, WorkflowPhase};
pub use reconciler::{
    load_manifest, relocated_key, ReconcileError, ReconcileSummary, ResultReconciler,
};

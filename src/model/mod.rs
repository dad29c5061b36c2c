//! Data model shared by the pipeline, mapper, reconciler and merge job.

pub mod manifest;
pub mod records;

pub use manifest::{ExecutionManifest, ManifestEntry, RunStatus};
pub use records::{
    Candidate, CandidateSet, CleanedActivity, EmissionFactorRow, InputRecord, MappedOutputRecord,
    MappingDecision, PossibleMatches, RowArtifact, RowError, RowStatus, REQUIRED_INPUT_COLUMNS,
};

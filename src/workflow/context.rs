//! Shared state threaded through the workflow phases

use super::mapper::MapRunSummary;
use super::merge::MergeSummary;
use super::reconciler::ReconcileSummary;
use serde::Serialize;

/// What each phase has produced so far. Later phases read the results of
/// earlier ones from here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowContext {
    pub input_key: String,

    /// Set by the map phase
    pub map: Option<MapRunSummary>,

    /// Set by the reconcile phase
    pub reconcile: Option<ReconcileSummary>,

    /// Set by the merge phase
    pub merge: Option<MergeSummary>,
}

impl WorkflowContext {
    pub fn new(input_key: impl Into<String>) -> Self {
        Self {
            input_key: input_key.into(),
            ..Default::default()
        }
    }

    pub fn manifest_key(&self) -> Option<&str> {
        self.map.as_ref().map(|m| m.manifest_key.as_str())
    }
}

use super::retry::StepError;
use crate::model::{CandidateSet, CleanedActivity, MappedOutputRecord, MappingDecision};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clean,
    Candidates,
    Select,
    Assemble,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::Candidates => "candidates",
            Stage::Select => "select",
            Stage::Assemble => "assemble",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one row through the pipeline. `Done` and `Failed` are
/// terminal; every other state has exactly one successor stage.
#[derive(Debug, Clone)]
pub enum RowState {
    NotStarted,
    Cleaned {
        cleaned: CleanedActivity,
    },
    Candidates {
        cleaned: CleanedActivity,
        candidates: CandidateSet,
    },
    Decided {
        cleaned: CleanedActivity,
        candidates: CandidateSet,
        decision: MappingDecision,
    },
    Done(MappedOutputRecord),
    Failed {
        stage: Stage,
        error: StepError,
    },
}

impl RowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RowState::Done(_) | RowState::Failed { .. })
    }

    /// Stage that the next transition will run, if any.
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            RowState::NotStarted => Some(Stage::Clean),
            RowState::Cleaned { .. } => Some(Stage::Candidates),
            RowState::Candidates { .. } => Some(Stage::Select),
            RowState::Decided { .. } => Some(Stage::Assemble),
            RowState::Done(_) | RowState::Failed { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RowState::NotStarted => "not_started",
            RowState::Cleaned { .. } => "cleaned",
            RowState::Candidates { .. } => "candidates",
            RowState::Decided { .. } => "decided",
            RowState::Done(_) => "done",
            RowState::Failed { .. } => "failed",
        }
    }
}

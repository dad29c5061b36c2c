//! Per-row mapping pipeline.

pub mod processor;
pub mod retry;
pub mod state;
pub mod steps;

pub use processor::{RecordProcessor, RowFailure};
pub use retry::{RetryPolicy, StepError};
pub use state::{RowState, Stage};

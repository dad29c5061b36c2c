//! The three model-driven steps of the per-row pipeline.

pub mod llm_helper;

#[path = "01_clean.rs"]
pub mod clean;
#[path = "02_candidates.rs"]
pub mod candidates;
#[path = "03_select.rs"]
pub mod select;

pub use candidates::CandidateStep;
pub use clean::CleanStep;
pub use select::SelectStep;

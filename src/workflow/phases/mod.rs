// Workflow phases: map the dataset, relocate successes, join with factors.

#[path = "01_map.rs"]
pub mod map;
#[path = "02_reconcile.rs"]
pub mod reconcile;
#[path = "03_merge.rs"]
pub mod merge;

pub use map::MapPhase;
pub use merge::MergePhase;
pub use reconcile::ReconcilePhase;

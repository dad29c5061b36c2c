pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, ConfigArgs, MergeArgs, ReconcileArgs, RunArgs};
pub use output::{OutputFormat, OutputFormatter};

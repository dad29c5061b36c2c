use eifmap::cli::commands::{CliArgs, Commands};
use eifmap::cli::handlers::{
    handle_config, handle_map, handle_merge, handle_reconcile, handle_run,
};
use eifmap::util::{init_logging, parse_level, LoggingConfig};
use eifmap::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("eifmap v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Run(run_args) => handle_run(run_args).await,
        Commands::Map(run_args) => handle_map(run_args).await,
        Commands::Reconcile(reconcile_args) => handle_reconcile(reconcile_args).await,
        Commands::Merge(merge_args) => handle_merge(merge_args).await,
        Commands::Config(config_args) => handle_config(config_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("EIFMAP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    let json = env::var("EIFMAP_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    init_logging(LoggingConfig {
        use_json: json,
        ..LoggingConfig::with_level(level)
    });
}

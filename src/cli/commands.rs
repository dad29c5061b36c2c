use crate::config::{parse_provider, EifmapConfig};
use crate::llm::RecordingMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use genai::adapter::AdapterKind;
use std::path::PathBuf;

/// LLM-driven mapping of procurement line items to classification codes and
/// emission factors
#[derive(Parser, Debug)]
#[command(
    name = "eifmap",
    about = "Map procurement line items to NAICS codes and supply-chain emission factors",
    version,
    author,
    long_about = "eifmap cleans each procurement line item with an LLM, retrieves candidate \
                  NAICS classifications, lets the model pick the best one, and joins the \
                  result against the supply-chain emission factor table. Individual row \
                  failures are tolerated up to a configurable percentage of the dataset."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the full workflow: map, reconcile, merge",
        long_about = "Maps every row of the input dataset, relocates the successful rows and \
                      joins them with the emission factor table. Reconcile and merge are \
                      skipped when the share of failed rows exceeds the tolerated percentage.\n\n\
                      Examples:\n  \
                      eifmap run\n  \
                      eifmap run --input input/q3.csv --concurrency 10\n  \
                      eifmap run --provider ollama --model qwen2.5:14b --format json"
    )]
    Run(RunArgs),

    #[command(
        about = "Map the input dataset and write the execution manifest",
        long_about = "Runs only the mapping stage and prints the manifest key, which can be \
                      passed to `eifmap reconcile`.\n\n\
                      Examples:\n  \
                      eifmap map --input input/activities.csv"
    )]
    Map(RunArgs),

    #[command(
        about = "Relocate the successful rows of a map run",
        long_about = "Copies every SUCCEEDED row of the manifest into successful-mappings/ \
                      and removes anything left there by earlier runs.\n\n\
                      Examples:\n  \
                      eifmap reconcile --manifest mapping-runs/<run-id>/manifest.json"
    )]
    Reconcile(ReconcileArgs),

    #[command(about = "Join relocated rows with the emission factor table")]
    Merge(MergeArgs),

    #[command(about = "Show the effective configuration")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    #[arg(
        long,
        value_name = "DIR",
        help = "Root directory of the local object store"
    )]
    pub storage_root: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, value_name = "KEY", help = "Object key of the input dataset")]
    pub input: Option<String>,

    #[arg(
        short = 'c',
        long,
        value_name = "N",
        help = "Maximum number of rows processed concurrently"
    )]
    pub concurrency: Option<usize>,

    #[arg(
        long,
        value_name = "PERCENT",
        help = "Run fails when more than this percentage of rows fail"
    )]
    pub tolerated_failure_percentage: Option<f64>,

    #[arg(
        short = 'p',
        long,
        value_parser = parse_provider_arg,
        help = "LLM provider (ollama, openai, claude, gemini, grok, groq)"
    )]
    pub provider: Option<AdapterKind>,

    #[arg(short = 'm', long, value_name = "MODEL", help = "Model name (provider-specific)")]
    pub model: Option<String>,

    #[arg(
        long,
        value_name = "URL",
        help = "Query a remote retrieval service instead of the local taxonomy"
    )]
    pub index_endpoint: Option<String>,

    #[arg(long, value_enum, help = "Record or replay LLM exchanges")]
    pub recording_mode: Option<RecordingModeArg>,

    #[arg(long, value_name = "DIR", help = "Directory holding recorded exchanges")]
    pub recordings_dir: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, value_name = "KEY", help = "Object key of the execution manifest")]
    pub manifest: String,

    #[arg(short = 'f', long, value_enum, default_value = "human")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(
        long,
        value_name = "KEY",
        help = "Object key of the emission factor table"
    )]
    pub emission_factors: Option<String>,

    #[arg(short = 'f', long, value_enum, default_value = "human")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(short = 'f', long, value_enum, default_value = "human")]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingModeArg {
    /// Call the provider directly
    Off,
    Record,
    Replay,
    Auto,
}

impl RecordingModeArg {
    pub fn mode(self) -> Option<RecordingMode> {
        match self {
            RecordingModeArg::Off => None,
            RecordingModeArg::Record => Some(RecordingMode::Record),
            RecordingModeArg::Replay => Some(RecordingMode::Replay),
            RecordingModeArg::Auto => Some(RecordingMode::Auto),
        }
    }
}

fn parse_provider_arg(s: &str) -> Result<AdapterKind, String> {
    parse_provider(s).map_err(|e| e.to_string())
}

impl StoreArgs {
    pub fn apply(&self, config: &mut EifmapConfig) {
        if let Some(root) = &self.storage_root {
            config.storage_root = root.clone();
        }
    }
}

impl RunArgs {
    /// Overrides config fields with the flags that were given.
    pub fn apply(&self, config: &mut EifmapConfig) {
        self.store.apply(config);
        if let Some(input) = &self.input {
            config.input_key = input.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        if let Some(pct) = self.tolerated_failure_percentage {
            config.tolerated_failure_percentage = pct;
        }
        if let Some(provider) = self.provider {
            config.provider = provider;
            if self.model.is_none() {
                config.model = crate::config::default_model(provider);
            }
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(endpoint) = &self.index_endpoint {
            config.index_endpoint = Some(endpoint.clone());
        }
    }
}

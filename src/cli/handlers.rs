//! Command handlers. Each returns the process exit code.

use super::commands::{ConfigArgs, MergeArgs, ReconcileArgs, RunArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::config::EifmapConfig;
use crate::llm::{GenAIClient, LLMClient, RecordingLLMClient};
use crate::pipeline::RecordProcessor;
use crate::progress::{LoggingHandler, ProgressHandler};
use crate::prompts::SelectionPrompt;
use crate::storage::{LocalObjectStore, ObjectStore};
use crate::workflow::{
    DistributedMapper, MapperSettings, MappingWorkflow, MergeJob, ReconcileError,
    ResultReconciler, WorkflowContext,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
/// The share of failed rows exceeded the tolerated percentage.
pub const EXIT_RUN_FAILED: i32 = 2;

fn load_config(apply: impl FnOnce(&mut EifmapConfig)) -> Result<EifmapConfig> {
    let mut config = EifmapConfig::default();
    apply(&mut config);
    config.validate().context("Invalid configuration")?;
    debug!("Effective configuration:\n{}", config);
    Ok(config)
}

fn open_store(config: &EifmapConfig) -> Arc<dyn ObjectStore> {
    info!("Using object store at {}", config.storage_root.display());
    Arc::new(LocalObjectStore::new(config.storage_root.clone()))
}

fn build_llm(config: &EifmapConfig, args: &RunArgs) -> Result<Arc<dyn LLMClient>> {
    let inner: Arc<dyn LLMClient> = Arc::new(GenAIClient::new(
        config.provider,
        config.model.clone(),
        config.request_timeout(),
    ));

    let recording = match args.recording_mode {
        Some(arg) => arg.mode().map(|mode| {
            let dir = args
                .recordings_dir
                .clone()
                .or_else(|| std::env::var("EIFMAP_RECORDINGS_DIR").ok().map(Into::into))
                .unwrap_or_else(|| "tests/recordings".into());
            RecordingLLMClient::new(inner.clone(), mode, dir)
        }),
        None if std::env::var("EIFMAP_RECORDING_MODE").is_ok() => {
            Some(RecordingLLMClient::from_env(inner.clone()))
        }
        None => None,
    };

    match recording {
        Some(client) => {
            let mut client = client.context("Failed to set up LLM recording")?;
            client
                .preload_cache()
                .context("Failed to load recorded LLM exchanges")?;
            Ok(Arc::new(client))
        }
        None => Ok(inner),
    }
}

async fn build_mapper(
    config: &EifmapConfig,
    store: Arc<dyn ObjectStore>,
    args: &RunArgs,
    progress: Arc<dyn ProgressHandler>,
) -> Result<DistributedMapper> {
    let llm = build_llm(config, args)?;
    info!(
        provider = config.provider.as_str(),
        model = %config.model,
        "Using LLM {}",
        llm.name()
    );

    let index = config.create_index(store.as_ref()).await?;
    info!("Using classification index: {}", index.name());

    let selection_prompt = if config.selection_example {
        SelectionPrompt::WithExample
    } else {
        SelectionPrompt::Plain
    };
    let processor = RecordProcessor::new(llm, index, config.retry_policy(), selection_prompt);

    Ok(DistributedMapper::new(
        store,
        Arc::new(processor),
        MapperSettings {
            max_concurrency: config.max_concurrency,
            tolerated_failure_percentage: config.tolerated_failure_percentage,
        },
        progress,
    ))
}

fn report_error(e: &anyhow::Error) -> i32 {
    error!("{:#}", e);
    eprintln!("Error: {:#}", e);
    EXIT_ERROR
}

pub async fn handle_run(args: &RunArgs) -> i32 {
    match run(args).await {
        Ok(code) => code,
        Err(e) => report_error(&e),
    }
}

async fn run(args: &RunArgs) -> Result<i32> {
    let config = load_config(|c| args.apply(c))?;
    let store = open_store(&config);
    let progress: Arc<dyn ProgressHandler> = Arc::new(LoggingHandler);

    let mapper = build_mapper(&config, store.clone(), args, progress.clone()).await?;
    let workflow = MappingWorkflow::standard(
        mapper,
        ResultReconciler::new(store.clone()),
        MergeJob::new(store, config.emission_factors_key.clone()),
        progress,
    );

    let mut context = WorkflowContext::new(config.input_key.clone());
    let result = workflow.execute(&mut context).await;

    let formatter = OutputFormatter::new(OutputFormat::from(args.format));
    println!("{}", formatter.format_run(&context)?);

    match result {
        Ok(()) => Ok(EXIT_SUCCESS),
        Err(e) if e.is_run_failure() => {
            eprintln!("{}", e);
            Ok(EXIT_RUN_FAILED)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn handle_map(args: &RunArgs) -> i32 {
    match map(args).await {
        Ok(code) => code,
        Err(e) => report_error(&e),
    }
}

async fn map(args: &RunArgs) -> Result<i32> {
    let config = load_config(|c| args.apply(c))?;
    let store = open_store(&config);
    let mapper = build_mapper(&config, store, args, Arc::new(LoggingHandler)).await?;

    let summary = mapper.run(&config.input_key).await?;
    let formatter = OutputFormatter::new(OutputFormat::from(args.format));
    println!("{}", formatter.format_map(&summary)?);

    if summary.status == crate::model::RunStatus::Failed {
        Ok(EXIT_RUN_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

pub async fn handle_reconcile(args: &ReconcileArgs) -> i32 {
    match reconcile(args).await {
        Ok(code) => code,
        Err(e) => report_error(&e),
    }
}

async fn reconcile(args: &ReconcileArgs) -> Result<i32> {
    let config = load_config(|c| args.store.apply(c))?;
    let reconciler = ResultReconciler::new(open_store(&config));

    match reconciler.reconcile(&args.manifest).await {
        Ok(summary) => {
            let formatter = OutputFormatter::new(OutputFormat::from(args.format));
            println!("{}", formatter.format_reconcile(&summary)?);
            Ok(EXIT_SUCCESS)
        }
        Err(e @ ReconcileError::RunFailed { .. }) => {
            eprintln!("{}", e);
            Ok(EXIT_RUN_FAILED)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn handle_merge(args: &MergeArgs) -> i32 {
    match merge(args).await {
        Ok(code) => code,
        Err(e) => report_error(&e),
    }
}

async fn merge(args: &MergeArgs) -> Result<i32> {
    let config = load_config(|c| {
        args.store.apply(c);
        if let Some(key) = &args.emission_factors {
            c.emission_factors_key = key.clone();
        }
    })?;

    let summary = MergeJob::new(open_store(&config), config.emission_factors_key.clone())
        .run()
        .await?;
    let formatter = OutputFormatter::new(OutputFormat::from(args.format));
    println!("{}", formatter.format_merge(&summary)?);
    Ok(EXIT_SUCCESS)
}

pub fn handle_config(args: &ConfigArgs) -> i32 {
    let config = EifmapConfig::default();
    let formatter = OutputFormatter::new(OutputFormat::from(args.format));
    let result = formatter.format_config(&config).map(|out| println!("{}", out));

    if let Err(e) = config.validate() {
        eprintln!("Warning: {}", e);
    }
    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => report_error(&e),
    }
}

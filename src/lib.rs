//! eifmap - emission factor mapping for procurement data
//!
//! Maps procurement line items (commodity, description, contract) to NAICS
//! classification codes with a three-step LLM pipeline, then joins the mapped
//! codes against the supply-chain emission factor table.
//!
//! # Core Concepts
//!
//! - **Record Processor**: clean the free-text description, retrieve candidate
//!   codes from a classification index, let the model pick the best one
//! - **Distributed Mapper**: runs the processor over a whole dataset with
//!   bounded concurrency and writes an execution manifest; the run fails only
//!   when too many rows fail
//! - **Result Reconciler**: relocates successful rows to a fixed area
//! - **Batch Merge Job**: splits the relocated rows into matched and
//!   unmatched emission factor tables
//!
//! # Example Usage
//!
//! ```ignore
//! use eifmap::{EifmapConfig, DistributedMapper, MapperSettings, RecordProcessor};
//! use eifmap::storage::LocalObjectStore;
//! use std::sync::Arc;
//!
//! let config = EifmapConfig::default();
//! let store = Arc::new(LocalObjectStore::new(config.storage_root.clone()));
//! let index = config.create_index(store.as_ref()).await?;
//! let processor = RecordProcessor::new(llm, index, config.retry_policy(), Default::default());
//! let mapper = DistributedMapper::new(store, Arc::new(processor), MapperSettings::default(), progress);
//! let summary = mapper.run(&config.input_key).await?;
//! println!("{} of {} rows mapped", summary.succeeded, summary.total_rows);
//! ```

pub mod cli;
pub mod config;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retrieval;
pub mod storage;
pub mod util;
pub mod workflow;

pub use config::{ConfigError, EifmapConfig};
pub use llm::{BackendError, GenAIClient, LLMClient, LLMRequest, LLMResponse};
pub use model::{ExecutionManifest, InputRecord, MappedOutputRecord, RunStatus};
pub use pipeline::{RecordProcessor, RetryPolicy, StepError};
pub use retrieval::{ClassificationIndex, HttpIndexClient, TaxonomyIndex};
pub use storage::{LocalObjectStore, MemoryObjectStore, ObjectStore, StoreError};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};
pub use workflow::{
    DistributedMapper, MapperSettings, MappingWorkflow, MergeJob, ResultReconciler,
    WorkflowContext, WorkflowError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

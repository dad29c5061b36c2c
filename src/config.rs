//! Configuration management for eifmap
//!
//! Settings are loaded from environment variables with defaults. Provider
//! credentials and endpoints are read by the `genai` library itself
//! (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `OLLAMA_HOST`, ...).
//!
//! # Environment Variables
//!
//! - `EIFMAP_PROVIDER`: ollama|openai|claude|gemini|grok|groq - default: "claude"
//! - `EIFMAP_MODEL`: provider-specific model name
//! - `EIFMAP_REQUEST_TIMEOUT`: seconds per model call - default: "120"
//! - `EIFMAP_LOG_LEVEL`: default: "info"
//! - `EIFMAP_MAX_CONCURRENCY`: rows mapped in parallel - default: "5"
//! - `EIFMAP_TOLERATED_FAILURE_PERCENTAGE`: default: "10"
//! - `EIFMAP_MAX_RETRIES`, `EIFMAP_RETRY_INTERVAL`, `EIFMAP_BACKOFF_RATE`:
//!   throttling retry policy - defaults: 5, 5s, 2.0
//! - `EIFMAP_STORAGE_ROOT`: local bucket root - default: "./eif-bucket"
//! - `EIFMAP_INPUT_KEY`, `EIFMAP_EMISSION_FACTORS_KEY`, `EIFMAP_TAXONOMY_KEY`:
//!   object keys of the datasets
//! - `EIFMAP_INDEX_ENDPOINT`: remote retrieval service (optional)
//! - `EIFMAP_SELECTION_EXAMPLE`: use the worked-example selection prompt

use crate::pipeline::RetryPolicy;
use crate::retrieval::{ClassificationIndex, HttpIndexClient, TaxonomyIndex};
use crate::storage::ObjectStore;
use genai::adapter::AdapterKind;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CLAUDE_MODEL: &str = "claude-3-haiku-20240307";
const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:7b";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_CONCURRENCY: usize = 5;
const DEFAULT_TOLERATED_FAILURE_PERCENTAGE: f64 = 10.0;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 5;
const DEFAULT_BACKOFF_RATE: f64 = 2.0;
const DEFAULT_STORAGE_ROOT: &str = "./eif-bucket";

pub const DEFAULT_INPUT_KEY: &str = "input/activities.csv";
pub const DEFAULT_EMISSION_FACTORS_KEY: &str =
    "datasets/SupplyChainGHGEmissionFactors_v1.3.0_NAICS_CO2e_USD2022.csv";
pub const DEFAULT_TAXONOMY_KEY: &str = "datasets/naics_titles.csv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: ollama, openai, claude, gemini, grok, groq")]
    InvalidProvider(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to load classification taxonomy from {key}: {message}")]
    TaxonomyLoad { key: String, message: String },
}

/// Effective settings for one mapping deployment.
#[derive(Debug, Clone)]
pub struct EifmapConfig {
    pub provider: AdapterKind,
    pub model: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub max_concurrency: usize,
    pub tolerated_failure_percentage: f64,
    pub max_retries: u32,
    pub retry_interval_secs: u64,
    pub backoff_rate: f64,
    pub storage_root: PathBuf,
    pub input_key: String,
    pub emission_factors_key: String,
    pub taxonomy_key: String,
    pub index_endpoint: Option<String>,
    pub selection_example: bool,
}

/// Maps the user-facing provider names onto genai adapters.
pub fn parse_provider(name: &str) -> Result<AdapterKind, ConfigError> {
    match name.to_lowercase().as_str() {
        "ollama" => Ok(AdapterKind::Ollama),
        "openai" => Ok(AdapterKind::OpenAI),
        "claude" | "anthropic" => Ok(AdapterKind::Anthropic),
        "gemini" => Ok(AdapterKind::Gemini),
        "grok" | "xai" => Ok(AdapterKind::Xai),
        "groq" => Ok(AdapterKind::Groq),
        other => Err(ConfigError::InvalidProvider(other.to_string())),
    }
}

pub fn default_model(provider: AdapterKind) -> String {
    match provider {
        AdapterKind::Ollama => DEFAULT_OLLAMA_MODEL.to_string(),
        AdapterKind::OpenAI => DEFAULT_OPENAI_MODEL.to_string(),
        _ => DEFAULT_CLAUDE_MODEL.to_string(),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Default for EifmapConfig {
    /// Loads `EIFMAP_*` variables, falling back to defaults for anything
    /// missing or unparsable. Range checks happen in `validate`.
    fn default() -> Self {
        let provider = env::var("EIFMAP_PROVIDER")
            .ok()
            .and_then(|s| parse_provider(&s).ok())
            .unwrap_or(AdapterKind::Anthropic);

        let model = env::var("EIFMAP_MODEL").unwrap_or_else(|_| default_model(provider));

        let log_level = env::var("EIFMAP_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        let selection_example = env_parse::<bool>("EIFMAP_SELECTION_EXAMPLE").unwrap_or(false);

        let index_endpoint = env::var("EIFMAP_INDEX_ENDPOINT")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Self {
            provider,
            model,
            request_timeout_secs: env_parse("EIFMAP_REQUEST_TIMEOUT")
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            log_level,
            max_concurrency: env_parse("EIFMAP_MAX_CONCURRENCY")
                .unwrap_or(DEFAULT_MAX_CONCURRENCY),
            tolerated_failure_percentage: env_parse("EIFMAP_TOLERATED_FAILURE_PERCENTAGE")
                .unwrap_or(DEFAULT_TOLERATED_FAILURE_PERCENTAGE),
            max_retries: env_parse("EIFMAP_MAX_RETRIES").unwrap_or(DEFAULT_MAX_RETRIES),
            retry_interval_secs: env_parse("EIFMAP_RETRY_INTERVAL")
                .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS),
            backoff_rate: env_parse("EIFMAP_BACKOFF_RATE").unwrap_or(DEFAULT_BACKOFF_RATE),
            storage_root: env::var("EIFMAP_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_ROOT)),
            input_key: env::var("EIFMAP_INPUT_KEY")
                .unwrap_or_else(|_| DEFAULT_INPUT_KEY.to_string()),
            emission_factors_key: env::var("EIFMAP_EMISSION_FACTORS_KEY")
                .unwrap_or_else(|_| DEFAULT_EMISSION_FACTORS_KEY.to_string()),
            taxonomy_key: env::var("EIFMAP_TAXONOMY_KEY")
                .unwrap_or_else(|_| DEFAULT_TAXONOMY_KEY.to_string()),
            index_endpoint,
            selection_example,
        }
    }
}

impl EifmapConfig {
    /// Validates numeric ranges and the log level.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        if self.max_concurrency == 0 || self.max_concurrency > 1000 {
            return Err(ConfigError::ValidationFailed(format!(
                "Max concurrency must be between 1 and 1000, got {}",
                self.max_concurrency
            )));
        }

        if !(0.0..=100.0).contains(&self.tolerated_failure_percentage) {
            return Err(ConfigError::ValidationFailed(format!(
                "Tolerated failure percentage must be between 0 and 100, got {}",
                self.tolerated_failure_percentage
            )));
        }

        if self.backoff_rate < 1.0 {
            return Err(ConfigError::ValidationFailed(format!(
                "Backoff rate must be at least 1.0, got {}",
                self.backoff_rate
            )));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Model name cannot be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            interval: Duration::from_secs(self.retry_interval_secs),
            backoff_rate: self.backoff_rate,
        }
    }

    /// Builds the retrieval index: the remote service when an endpoint is
    /// configured, otherwise the local taxonomy loaded from the store.
    pub async fn create_index(
        &self,
        store: &dyn ObjectStore,
    ) -> Result<Arc<dyn ClassificationIndex>, ConfigError> {
        if let Some(endpoint) = &self.index_endpoint {
            return Ok(Arc::new(HttpIndexClient::new(
                endpoint.clone(),
                self.request_timeout(),
            )));
        }

        let bytes = store
            .get(&self.taxonomy_key)
            .await
            .map_err(|e| ConfigError::TaxonomyLoad {
                key: self.taxonomy_key.clone(),
                message: e.to_string(),
            })?;
        let index =
            TaxonomyIndex::from_csv_reader(bytes.as_slice()).map_err(|e| {
                ConfigError::TaxonomyLoad {
                    key: self.taxonomy_key.clone(),
                    message: e.to_string(),
                }
            })?;

        Ok(Arc::new(index))
    }

    pub fn to_display_map(&self) -> std::collections::HashMap<String, String> {
        let mut map = std::collections::HashMap::new();

        map.insert("provider".to_string(), self.provider.as_str().to_string());
        map.insert("model".to_string(), self.model.clone());
        map.insert(
            "request_timeout_secs".to_string(),
            self.request_timeout_secs.to_string(),
        );
        map.insert("log_level".to_string(), self.log_level.clone());
        map.insert(
            "max_concurrency".to_string(),
            self.max_concurrency.to_string(),
        );
        map.insert(
            "tolerated_failure_percentage".to_string(),
            self.tolerated_failure_percentage.to_string(),
        );
        map.insert("max_retries".to_string(), self.max_retries.to_string());
        map.insert(
            "retry_interval_secs".to_string(),
            self.retry_interval_secs.to_string(),
        );
        map.insert("backoff_rate".to_string(), self.backoff_rate.to_string());
        map.insert(
            "storage_root".to_string(),
            self.storage_root.display().to_string(),
        );
        map.insert("input_key".to_string(), self.input_key.clone());
        map.insert(
            "emission_factors_key".to_string(),
            self.emission_factors_key.clone(),
        );
        map.insert("taxonomy_key".to_string(), self.taxonomy_key.clone());
        if let Some(ref endpoint) = self.index_endpoint {
            map.insert("index_endpoint".to_string(), endpoint.clone());
        }
        map.insert(
            "selection_example".to_string(),
            self.selection_example.to_string(),
        );

        map
    }
}

impl fmt::Display for EifmapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Eifmap Configuration:")?;
        writeln!(f, "  Provider: {}", self.provider.as_str())?;
        writeln!(f, "  Model: {}", self.model)?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Max Concurrency: {}", self.max_concurrency)?;
        writeln!(
            f,
            "  Tolerated Failure: {}%",
            self.tolerated_failure_percentage
        )?;
        writeln!(
            f,
            "  Retry Policy: {} retries, {}s interval, x{} backoff",
            self.max_retries, self.retry_interval_secs, self.backoff_rate
        )?;
        writeln!(f, "  Storage Root: {}", self.storage_root.display())?;
        writeln!(f, "  Input Key: {}", self.input_key)?;
        writeln!(f, "  Emission Factors Key: {}", self.emission_factors_key)?;
        match &self.index_endpoint {
            Some(endpoint) => writeln!(f, "  Index: {}", endpoint)?,
            None => writeln!(f, "  Index: local taxonomy at {}", self.taxonomy_key)?,
        }
        writeln!(f, "  Selection Example: {}", self.selection_example)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

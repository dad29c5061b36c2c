//! Request/response recording for deterministic replays of mapping runs

use crate::llm::{BackendError, ChatMessage, LLMClient, LLMRequest, LLMResponse};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Recording mode for LLM interactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingMode {
    /// Record new exchanges and save to disk
    Record,
    /// Replay from recorded exchanges, fail if not found
    Replay,
    /// Replay if recording exists, otherwise record
    Auto,
}

impl RecordingMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "record" => Ok(RecordingMode::Record),
            "replay" => Ok(RecordingMode::Replay),
            "auto" => Ok(RecordingMode::Auto),
            _ => anyhow::bail!("Invalid recording mode: {}", s),
        }
    }

    /// Reads `EIFMAP_RECORDING_MODE`, falling back to `default`.
    pub fn from_env(default: RecordingMode) -> RecordingMode {
        std::env::var("EIFMAP_RECORDING_MODE")
            .ok()
            .and_then(|s| Self::parse(&s).ok())
            .unwrap_or(default)
    }
}

/// A recorded request-response exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedExchange {
    pub request_hash: String,
    pub request: RecordedRequest,
    pub response: LLMResponse,
    /// ISO 8601
    pub recorded_at: String,
}

/// The parts of a request that determine its answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl RecordedRequest {
    pub fn from_llm_request(req: &LLMRequest) -> Self {
        Self {
            messages: req.messages.clone(),
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            top_p: req.top_p,
        }
    }

    /// MD5 of the canonical JSON form.
    pub fn canonical_hash(&self) -> Result<String> {
        let canonical_json =
            serde_json::to_string(self).context("Failed to serialize request")?;
        Ok(format!("{:x}", md5::compute(canonical_json.as_bytes())))
    }
}

/// LLM client that records or replays interactions
pub struct RecordingLLMClient {
    inner: Arc<dyn LLMClient>,
    mode: RecordingMode,
    recordings_dir: PathBuf,
    cache: HashMap<String, LLMResponse>,
}

impl RecordingLLMClient {
    pub fn new(
        inner: Arc<dyn LLMClient>,
        mode: RecordingMode,
        recordings_dir: PathBuf,
    ) -> Result<Self> {
        std::fs::create_dir_all(&recordings_dir)
            .context("Failed to create recordings directory")?;

        Ok(Self {
            inner,
            mode,
            recordings_dir,
            cache: HashMap::new(),
        })
    }

    /// Mode from `EIFMAP_RECORDING_MODE` (default auto), directory from
    /// `EIFMAP_RECORDINGS_DIR` (default `tests/recordings`).
    pub fn from_env(inner: Arc<dyn LLMClient>) -> Result<Self> {
        let mode = RecordingMode::from_env(RecordingMode::Auto);
        let recordings_dir = std::env::var("EIFMAP_RECORDINGS_DIR")
            .unwrap_or_else(|_| "tests/recordings".to_string())
            .into();

        Self::new(inner, mode, recordings_dir)
    }

    fn recording_path(&self, request_hash: &str) -> PathBuf {
        self.recordings_dir.join(format!("{}.json", request_hash))
    }

    fn load_recording(&self, request_hash: &str) -> Result<Option<LLMResponse>> {
        let path = self.recording_path(request_hash);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read recording: {}", path.display()))?;

        let exchange: RecordedExchange = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse recording: {}", path.display()))?;

        Ok(Some(exchange.response))
    }

    fn save_recording(
        &self,
        request_hash: &str,
        request: &RecordedRequest,
        response: &LLMResponse,
    ) -> Result<()> {
        let exchange = RecordedExchange {
            request_hash: request_hash.to_string(),
            request: request.clone(),
            response: response.clone(),
            recorded_at: chrono::Utc::now().to_rfc3339(),
        };

        let path = self.recording_path(request_hash);
        let contents =
            serde_json::to_string_pretty(&exchange).context("Failed to serialize recording")?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write recording: {}", path.display()))?;

        debug!(hash = %request_hash, "Saved LLM recording");
        Ok(())
    }

    /// Load all recordings into cache
    pub fn preload_cache(&mut self) -> Result<()> {
        if !self.recordings_dir.exists() {
            return Ok(());
        }

        for entry in std::fs::read_dir(&self.recordings_dir)? {
            let path = entry?.path();

            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let contents = std::fs::read_to_string(&path)?;
            let exchange: RecordedExchange = serde_json::from_str(&contents)?;

            self.cache
                .insert(exchange.request_hash.clone(), exchange.response);
        }

        Ok(())
    }

    fn replay(&self, request_hash: &str) -> Result<Option<LLMResponse>, BackendError> {
        if let Some(response) = self.cache.get(request_hash) {
            return Ok(Some(response.clone()));
        }

        self.load_recording(request_hash)
            .map_err(|e| BackendError::Other {
                message: format!("Failed to load recording: {}", e),
            })
    }

    async fn record(
        &self,
        request_hash: &str,
        recorded_request: &RecordedRequest,
        request: LLMRequest,
    ) -> Result<LLMResponse, BackendError> {
        // Errors (including throttling) pass through unrecorded so the
        // caller's retry policy still sees them.
        let response = self.inner.chat(request).await?;

        self.save_recording(request_hash, recorded_request, &response)
            .map_err(|e| BackendError::Other {
                message: format!("Failed to save recording: {}", e),
            })?;

        Ok(response)
    }
}

#[async_trait::async_trait]
impl LLMClient for RecordingLLMClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let recorded_request = RecordedRequest::from_llm_request(&request);
        let request_hash = recorded_request
            .canonical_hash()
            .map_err(|e| BackendError::Other {
                message: e.to_string(),
            })?;

        match self.mode {
            RecordingMode::Replay => self.replay(&request_hash)?.ok_or_else(|| {
                BackendError::Other {
                    message: format!(
                        "No recording found for request hash: {} (mode: Replay)",
                        request_hash
                    ),
                }
            }),
            RecordingMode::Record => {
                self.record(&request_hash, &recorded_request, request)
                    .await
            }
            RecordingMode::Auto => {
                if let Some(response) = self.replay(&request_hash)? {
                    return Ok(response);
                }
                self.record(&request_hash, &recorded_request, request)
                    .await
            }
        }
    }

    fn name(&self) -> &str {
        "RecordingLLMClient"
    }

    fn model_info(&self) -> Option<String> {
        self.inner.model_info()
    }
}

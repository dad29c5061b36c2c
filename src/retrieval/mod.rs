//! Classification-index access
//!
//! Step 2 narrows the taxonomy to a handful of entries before asking the
//! model to choose among them. The index is a trait so the pipeline can run
//! against the bundled lexical [`TaxonomyIndex`] or a remote retrieval
//! service through [`HttpIndexClient`].

mod http;
mod taxonomy;

pub use http::HttpIndexClient;
pub use taxonomy::TaxonomyIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of entries retrieved per query by the mapping pipeline.
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedEntry {
    pub code: String,
    pub title: String,
    /// Source passage; equals the title when the taxonomy has no description.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub score: f64,
}

impl RetrievedEntry {
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            code: code.into(),
            text: title.clone(),
            title,
            score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Retrieval throttled: {message}")]
    Throttled { message: String },

    #[error("Retrieval service unavailable: {message}")]
    Unavailable { message: String },

    #[error("Invalid retrieval response: {message}")]
    InvalidResponse { message: String },

    #[error("Invalid retrieval query: {message}")]
    InvalidQuery { message: String },

    #[error("Failed to load taxonomy: {message}")]
    Load { message: String },
}

impl IndexError {
    pub fn is_throttling(&self) -> bool {
        matches!(self, IndexError::Throttled { .. })
    }
}

#[async_trait]
pub trait ClassificationIndex: Send + Sync {
    /// Returns at most `k` entries, nearest first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedEntry>, IndexError>;

    fn name(&self) -> &str;
}

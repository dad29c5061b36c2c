//! LLM client abstraction layer
//!
//! Trait-based access to generation models so the mapping steps can run
//! against a hosted provider, a recording/replay wrapper or a scripted mock.

mod client;
pub mod error;
mod genai;
mod mock;
mod recording;
mod types;

pub use client::LLMClient;
pub use error::BackendError;
pub use genai::GenAIClient;
pub use mock::{MockLLMClient, MockResponse};
pub use recording::{RecordedExchange, RecordedRequest, RecordingLLMClient, RecordingMode};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};

//! Errors raised by generation-model backends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to a generation model
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum BackendError {
    /// API request failed with the given message
    #[error("API error{}: {message}", status_suffix(.status_code))]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// Authentication failed or credentials are invalid
    #[error("Authentication failed: {message}")]
    AuthenticationError { message: String },

    /// Request timed out after the specified duration (in seconds)
    #[error("Request timed out after {seconds} seconds")]
    TimeoutError { seconds: u64 },

    /// Provider throttled the request
    #[error("Rate limit exceeded{}", retry_suffix(.retry_after))]
    RateLimitError { retry_after: Option<u64> },

    /// Invalid or malformed response from the LLM
    #[error("Invalid response from LLM: {message}")]
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    /// Configuration error (missing API keys, invalid settings, etc.)
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Network-related error
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Error: {message}")]
    Other { message: String },
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code
        .map(|code| format!(" ({})", code))
        .unwrap_or_default()
}

fn retry_suffix(retry_after: &Option<u64>) -> String {
    retry_after
        .map(|seconds| format!(", retry after {} seconds", seconds))
        .unwrap_or_default()
}

impl BackendError {
    /// Whether the failure is a capacity condition worth retrying.
    pub fn is_throttling(&self) -> bool {
        match self {
            BackendError::RateLimitError { .. } => true,
            BackendError::ApiError { status_code, .. } => *status_code == Some(429),
            _ => false,
        }
    }

    /// Classifies a provider error message, promoting throttling signals to
    /// `RateLimitError`.
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if looks_like_throttling(&message) {
            BackendError::RateLimitError { retry_after: None }
        } else {
            BackendError::ApiError {
                message,
                status_code: None,
            }
        }
    }
}

/// Heuristic match over provider error text. Providers report throttling as
/// HTTP 429, `ThrottlingException`, `LimitExceededException` or plain prose.
pub fn looks_like_throttling(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("429")
        || lower.contains("throttl")
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("limitexceeded")
        || lower.contains("limit exceeded")
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        status_429 = { "HTTP status 429 Too Many Requests", true },
        throttling_exception = { "ThrottlingException: Rate exceeded", true },
        limit_exceeded = { "LimitExceededException", true },
        prose = { "rate limit reached for requests", true },
        server_error = { "HTTP status 500 Internal Server Error", false },
        bad_request = { "invalid request: max_tokens too large", false },
    )]
    fn classifies_provider_messages(message: &str, throttled: bool) {
        assert_eq!(looks_like_throttling(message), throttled);
        assert_eq!(
            BackendError::from_provider_message(message).is_throttling(),
            throttled
        );
    }

    #[test]
    fn api_error_with_429_status_is_throttling() {
        let err = BackendError::ApiError {
            message: "slow down".to_string(),
            status_code: Some(429),
        };
        assert!(err.is_throttling());
    }

    #[test]
    fn timeout_is_not_throttling() {
        assert!(!BackendError::TimeoutError { seconds: 30 }.is_throttling());
    }

    #[test]
    fn display_includes_status_code() {
        let err = BackendError::ApiError {
            message: "boom".to_string(),
            status_code: Some(503),
        };
        assert_eq!(err.to_string(), "API error (503): boom");

        let err = BackendError::RateLimitError {
            retry_after: Some(7),
        };
        assert_eq!(err.to_string(), "Rate limit exceeded, retry after 7 seconds");
    }
}

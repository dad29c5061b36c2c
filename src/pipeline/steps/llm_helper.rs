use crate::llm::{LLMClient, LLMRequest};
use crate::pipeline::retry::{RetryPolicy, StepError};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::debug;

/// Strips a surrounding markdown code fence, if any. No other repair is
/// attempted on model output.
pub fn extract_json_from_markdown(content: &str) -> &str {
    let trimmed = content.trim();

    if let Some(start_idx) = trimmed.find("```json") {
        let after_fence = &trimmed[start_idx + 7..];
        if let Some(end_idx) = after_fence.find("```") {
            return after_fence[..end_idx].trim();
        }
    }

    if let Some(start_idx) = trimmed.find("```") {
        let after_fence = &trimmed[start_idx + 3..];
        if let Some(end_idx) = after_fence.find("```") {
            return after_fence[..end_idx].trim();
        }
    }

    trimmed
}

pub fn parse_json<T: DeserializeOwned>(step: &str, raw: &str) -> Result<T, StepError> {
    let json_content = extract_json_from_markdown(raw);
    serde_json::from_str(json_content).map_err(|e| {
        StepError::malformed(format!("{} response is not valid JSON: {}", step, e), raw)
    })
}

/// Sends one request under the retry policy and returns the raw text.
pub async fn complete(
    llm_client: &dyn LLMClient,
    request: LLMRequest,
    retry: &RetryPolicy,
    step: &str,
) -> Result<String, StepError> {
    let start = Instant::now();

    let response = retry
        .run(step, || {
            let request = request.clone();
            async move { llm_client.chat(request).await.map_err(StepError::from) }
        })
        .await?;

    debug!(
        step,
        latency_ms = start.elapsed().as_millis() as u64,
        chars = response.content.len(),
        "Model call complete"
    );

    Ok(response.content)
}

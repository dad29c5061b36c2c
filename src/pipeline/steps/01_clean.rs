use super::llm_helper;
use crate::llm::{LLMClient, LLMRequest};
use crate::model::{CleanedActivity, InputRecord};
use crate::pipeline::retry::{RetryPolicy, StepError};
use crate::prompts;
use std::sync::Arc;

pub const CLEAN_MAX_TOKENS: u32 = 500;

/// Turns a raw line item into a short plain-language activity description.
pub struct CleanStep {
    llm: Arc<dyn LLMClient>,
    retry: RetryPolicy,
}

impl CleanStep {
    pub fn new(llm: Arc<dyn LLMClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    pub async fn execute(&self, input: &InputRecord) -> Result<CleanedActivity, StepError> {
        let request = LLMRequest::user_prompt(prompts::render_clean_prompt(input))
            .with_max_tokens(CLEAN_MAX_TOKENS);

        let text = llm_helper::complete(self.llm.as_ref(), request, &self.retry, "clean").await?;

        // The description is taken verbatim; only an empty answer is rejected.
        if text.trim().is_empty() {
            return Err(StepError::malformed("clean response is empty", text));
        }

        Ok(CleanedActivity {
            simplified_description: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLLMClient, MockResponse};

    fn input() -> InputRecord {
        InputRecord::new("C1", "GLOVES WORK", "RC LN", "Warehouse")
    }

    #[tokio::test]
    async fn test_returns_text_verbatim() {
        let llm = Arc::new(MockLLMClient::new());
        llm.add_response(MockResponse::text(" The item is work gloves \n"));

        let step = CleanStep::new(llm.clone(), RetryPolicy::none());
        let cleaned = step.execute(&input()).await.unwrap();

        assert_eq!(cleaned.simplified_description, " The item is work gloves \n");
        let request = &llm.requests()[0];
        assert_eq!(request.max_tokens, Some(CLEAN_MAX_TOKENS));
        assert!(request.prompt_text().unwrap().contains("GLOVES WORK"));
    }

    #[tokio::test]
    async fn test_blank_response_fails() {
        let llm = Arc::new(MockLLMClient::new());
        llm.add_response(MockResponse::text("   "));

        let step = CleanStep::new(llm, RetryPolicy::none());
        let err = step.execute(&input()).await.unwrap_err();
        assert!(matches!(err, StepError::MalformedResponse { .. }));
    }
}

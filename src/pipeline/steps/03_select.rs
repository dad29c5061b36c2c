use super::llm_helper;
use crate::llm::{LLMClient, LLMRequest};
use crate::model::{CandidateSet, CleanedActivity, MappingDecision};
use crate::pipeline::retry::{RetryPolicy, StepError};
use crate::prompts::{self, SelectionPrompt};
use std::sync::Arc;
use tracing::warn;

pub const SELECT_MAX_TOKENS: u32 = 500;

/// Picks the single best candidate, with a justification.
pub struct SelectStep {
    llm: Arc<dyn LLMClient>,
    retry: RetryPolicy,
    prompt: SelectionPrompt,
}

impl SelectStep {
    pub fn new(llm: Arc<dyn LLMClient>, retry: RetryPolicy, prompt: SelectionPrompt) -> Self {
        Self { llm, retry, prompt }
    }

    pub async fn execute(
        &self,
        cleaned: &CleanedActivity,
        candidates: &CandidateSet,
    ) -> Result<MappingDecision, StepError> {
        let request = LLMRequest::user_prompt(prompts::render_best_match_prompt(
            cleaned,
            candidates,
            self.prompt,
        ))
        .with_max_tokens(SELECT_MAX_TOKENS);

        let raw = llm_helper::complete(self.llm.as_ref(), request, &self.retry, "select").await?;
        let decision: MappingDecision = llm_helper::parse_json("select", &raw)?;
        decision
            .check()
            .map_err(|message| StepError::malformed(message, raw.clone()))?;

        // Codes outside the candidate set are kept; the merge job reports
        // them when they have no emission factor.
        if !candidates.contains_code(&decision.best_code) {
            warn!(
                code = %decision.best_code,
                "Selected code is not among the candidates"
            );
        }

        Ok(decision)
    }
}

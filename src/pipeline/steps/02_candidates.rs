use super::llm_helper;
use crate::llm::{LLMClient, LLMRequest};
use crate::model::{CandidateSet, CleanedActivity, PossibleMatches};
use crate::pipeline::retry::{RetryPolicy, StepError};
use crate::prompts;
use crate::retrieval::{ClassificationIndex, DEFAULT_TOP_K};
use std::sync::Arc;
use tracing::debug;

pub const CANDIDATES_MAX_TOKENS: u32 = 512;

/// Retrieve-and-generate: nearest taxonomy entries, rendered by the model
/// into a fixed JSON shape.
pub struct CandidateStep {
    llm: Arc<dyn LLMClient>,
    index: Arc<dyn ClassificationIndex>,
    retry: RetryPolicy,
    top_k: usize,
}

impl CandidateStep {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        index: Arc<dyn ClassificationIndex>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            llm,
            index,
            retry,
            top_k: DEFAULT_TOP_K,
        }
    }

    async fn retrieve_and_generate(&self, query: &str) -> Result<String, StepError> {
        let entries = self.index.retrieve(query, self.top_k).await?;
        debug!(
            index = self.index.name(),
            retrieved = entries.len(),
            "Retrieved taxonomy entries"
        );

        let request =
            LLMRequest::user_prompt(prompts::render_possible_matches_prompt(query, &entries))
                .with_max_tokens(CANDIDATES_MAX_TOKENS)
                .with_temperature(0.0)
                .with_top_p(1.0);

        let response = self.llm.chat(request).await?;
        Ok(response.content)
    }

    pub async fn execute(&self, cleaned: &CleanedActivity) -> Result<CandidateSet, StepError> {
        let query = cleaned.simplified_description.trim();

        // Retrieval and generation are retried together as one request.
        let raw = self
            .retry
            .run("candidates", || self.retrieve_and_generate(query))
            .await?;

        let matches: PossibleMatches = llm_helper::parse_json("candidates", &raw)?;
        matches
            .to_candidate_set()
            .map_err(|message| StepError::malformed(message, raw))
    }
}

//! Per-row pipeline: clean, retrieve candidates, select, assemble.

use super::retry::{RetryPolicy, StepError};
use super::state::{RowState, Stage};
use super::steps::{CandidateStep, CleanStep, SelectStep};
use crate::llm::LLMClient;
use crate::model::{InputRecord, MappedOutputRecord};
use crate::prompts::SelectionPrompt;
use crate::retrieval::ClassificationIndex;
use std::sync::Arc;
use tracing::debug;

/// Terminal failure of one row.
#[derive(Debug, Clone)]
pub struct RowFailure {
    pub stage: Stage,
    pub error: StepError,
}

pub struct RecordProcessor {
    clean: CleanStep,
    candidates: CandidateStep,
    select: SelectStep,
}

impl RecordProcessor {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        index: Arc<dyn ClassificationIndex>,
        retry: RetryPolicy,
        selection_prompt: SelectionPrompt,
    ) -> Self {
        Self {
            clean: CleanStep::new(llm.clone(), retry.clone()),
            candidates: CandidateStep::new(llm.clone(), index, retry.clone()),
            select: SelectStep::new(llm, retry, selection_prompt),
        }
    }

    /// Performs exactly one transition. Terminal states are returned as is.
    pub async fn advance(&self, input: &InputRecord, state: RowState) -> RowState {
        match state {
            RowState::NotStarted => match self.clean.execute(input).await {
                Ok(cleaned) => RowState::Cleaned { cleaned },
                Err(error) => RowState::Failed {
                    stage: Stage::Clean,
                    error,
                },
            },
            RowState::Cleaned { cleaned } => match self.candidates.execute(&cleaned).await {
                Ok(candidates) => RowState::Candidates {
                    cleaned,
                    candidates,
                },
                Err(error) => RowState::Failed {
                    stage: Stage::Candidates,
                    error,
                },
            },
            RowState::Candidates {
                cleaned,
                candidates,
            } => match self.select.execute(&cleaned, &candidates).await {
                Ok(decision) => RowState::Decided {
                    cleaned,
                    candidates,
                    decision,
                },
                Err(error) => RowState::Failed {
                    stage: Stage::Select,
                    error,
                },
            },
            RowState::Decided {
                cleaned,
                candidates,
                decision,
            } => RowState::Done(MappedOutputRecord::assemble(
                input,
                &cleaned,
                &candidates,
                &decision,
            )),
            terminal @ (RowState::Done(_) | RowState::Failed { .. }) => terminal,
        }
    }

    /// Runs the row to a terminal state.
    pub async fn process(&self, input: &InputRecord) -> Result<MappedOutputRecord, RowFailure> {
        let mut state = RowState::NotStarted;
        loop {
            state = match state {
                RowState::Done(record) => return Ok(record),
                RowState::Failed { stage, error } => return Err(RowFailure { stage, error }),
                pending => {
                    let from = pending.name();
                    let next = self.advance(input, pending).await;
                    debug!(from, to = next.name(), "Row transition");
                    next
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{BackendError, MockLLMClient, MockResponse};
    use crate::retrieval::TaxonomyIndex;

    fn processor(llm: Arc<MockLLMClient>) -> RecordProcessor {
        let index = Arc::new(TaxonomyIndex::from_entries(vec![
            ("315990", "Apparel Accessories and Other Apparel Manufacturing"),
            ("316998", "All Other Leather Good and Allied Product Manufacturing"),
        ]));
        RecordProcessor::new(llm, index, RetryPolicy::none(), SelectionPrompt::Plain)
    }

    fn input() -> InputRecord {
        InputRecord::new("20142770002", "GLOVES WORK", "RC LN", "Warehouse")
    }

    fn happy_responses() -> Vec<MockResponse> {
        vec![
            MockResponse::text("synthetic leather large work gloves"),
            MockResponse::text(
                r#"{"NAICSCode1":"315990","NAICSTitle1":"Apparel Accessories and Other Apparel Manufacturing","NAICSCode2":"316998","NAICSTitle2":"All Other Leather Good and Allied Product Manufacturing"}"#,
            ),
            MockResponse::text(
                r#"{"BestNAICSCode":"315990","BestNAICSTitle":"Apparel Accessories and Other Apparel Manufacturing","Justification":"Gloves are apparel accessories"}"#,
            ),
        ]
    }

    #[tokio::test]
    async fn test_advance_moves_one_stage_at_a_time() {
        let llm = Arc::new(MockLLMClient::new());
        llm.add_responses(happy_responses());
        let processor = processor(llm.clone());

        let state = processor.advance(&input(), RowState::NotStarted).await;
        assert!(matches!(state, RowState::Cleaned { .. }));
        assert_eq!(llm.call_count(), 1);

        let state = processor.advance(&input(), state).await;
        assert!(matches!(state, RowState::Candidates { .. }));

        let state = processor.advance(&input(), state).await;
        assert!(matches!(state, RowState::Decided { .. }));

        let state = processor.advance(&input(), state).await;
        assert!(matches!(state, RowState::Done(_)));
        assert_eq!(llm.call_count(), 3);

        let state = processor.advance(&input(), state).await;
        assert!(matches!(state, RowState::Done(_)));
    }

    #[tokio::test]
    async fn test_process_preserves_input_fields() {
        let llm = Arc::new(MockLLMClient::new());
        llm.add_responses(happy_responses());

        let record = processor(llm).process(&input()).await.unwrap();

        assert_eq!(record.input(), input());
        assert_eq!(record.simplified_description, "synthetic leather large work gloves");
        assert_eq!(record.mapped_code, "315990");
        assert_eq!(record.possible_matches.code(2), Some("316998"));
    }

    #[tokio::test]
    async fn test_failure_stops_at_failing_stage() {
        let llm = Arc::new(MockLLMClient::new());
        llm.add_responses(vec![
            MockResponse::text("work gloves"),
            MockResponse::error(BackendError::ApiError {
                message: "model error".to_string(),
                status_code: Some(500),
            }),
        ]);

        let failure = processor(llm.clone()).process(&input()).await.unwrap_err();

        assert_eq!(failure.stage, Stage::Candidates);
        assert!(matches!(failure.error, StepError::Backend(_)));
        assert_eq!(llm.call_count(), 2);
    }
}

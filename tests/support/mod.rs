//! Shared fixtures for the integration tests
//!
//! `ScriptedLLM` answers each of the three mapping prompts from the row it
//! belongs to, so rows can run concurrently in any order. Rows are
//! identified by their `Commodity` value, which the scripted clean step
//! embeds in the simplified description as `item-id:<commodity>;`.

#![allow(dead_code)]

use async_trait::async_trait;
use eifmap::llm::{BackendError, LLMClient, LLMRequest, LLMResponse};
use eifmap::pipeline::RetryPolicy;
use eifmap::progress::NoOpHandler;
use eifmap::prompts::SelectionPrompt;
use eifmap::storage::{MemoryObjectStore, ObjectStore};
use eifmap::workflow::{DistributedMapper, MapperSettings};
use eifmap::{RecordProcessor, TaxonomyIndex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INPUT_KEY: &str = "input/activities.csv";
pub const FACTORS_KEY: &str = "datasets/factors.csv";

/// Rows whose commodity starts with this fail at the clean step.
pub const FAIL_PREFIX: &str = "FAIL";
/// Rows whose commodity starts with this are mapped to a code with no factor.
pub const UNMATCHED_PREFIX: &str = "MYSTERY";

pub const MATCHED_CODE: &str = "315990";
pub const UNMATCHED_CODE: &str = "999111";

pub const FACTORS_CSV: &str = "2017 NAICS Code,2017 NAICS Title,GHG,Unit,Supply Chain Emission Factors without Margins,Margins of Supply Chain Emission Factors,Supply Chain Emission Factors with Margins,Reference USEEIO Code\n\
315990,Apparel Accessories and Other Apparel Manufacturing,All GHGs,kg CO2e/2022 USD,0.180,0.046,0.226,315000\n\
316998,All Other Leather Good and Allied Product Manufacturing,All GHGs,kg CO2e/2022 USD,0.301,0.051,0.352,316000\n";

#[derive(Default)]
pub struct ScriptedLLM {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedLLM {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds every call open for `delay` so concurrency becomes observable.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn answer(prompt: &str) -> Result<String, BackendError> {
        if prompt.contains("BestNAICSCode") {
            let id = item_id(prompt);
            let (code, title) = if id.starts_with(UNMATCHED_PREFIX) {
                (UNMATCHED_CODE, "Unlisted Manufacturing")
            } else {
                (MATCHED_CODE, "Apparel Accessories and Other Apparel Manufacturing")
            };
            return Ok(format!(
                r#"{{"BestNAICSCode":"{}","BestNAICSTitle":"{}","Justification":"closest match for {}"}}"#,
                code, title, id
            ));
        }

        if prompt.contains("\"NAICSCode1\"") {
            return Ok(format!(
                "```json\n{{\"NAICSCode1\":\"{}\",\"NAICSTitle1\":\"Apparel Accessories and Other Apparel Manufacturing\",\"NAICSCode2\":\"{}\",\"NAICSTitle2\":\"Unlisted Manufacturing\",\"NAICSCode3\":\"316998\",\"NAICSTitle3\":\"All Other Leather Good and Allied Product Manufacturing\"}}\n```",
                MATCHED_CODE, UNMATCHED_CODE
            ));
        }

        let commodity = prompt
            .rsplit("\nCOMMODITY ")
            .next()
            .and_then(|rest| rest.lines().next())
            .unwrap_or_default()
            .trim()
            .to_string();
        if commodity.starts_with(FAIL_PREFIX) {
            return Err(BackendError::ApiError {
                message: "model refused the request".to_string(),
                status_code: Some(400),
            });
        }
        Ok(format!("work gloves item-id:{};", commodity))
    }
}

fn item_id(prompt: &str) -> String {
    prompt
        .split("item-id:")
        .nth(1)
        .and_then(|rest| rest.split(';').next())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let prompt = request.prompt_text().unwrap_or_default().to_string();
        self.prompts.lock().unwrap().push(prompt.clone());
        let result = Self::answer(&prompt);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result.map(|content| LLMResponse::text(content, Duration::from_millis(1)))
    }

    fn name(&self) -> &str {
        "ScriptedLLM"
    }
}

pub fn taxonomy() -> TaxonomyIndex {
    TaxonomyIndex::from_entries(vec![
        (
            "315990",
            "Apparel Accessories and Other Apparel Manufacturing",
        ),
        ("339920", "Sporting and Athletic Goods Manufacturing"),
        (
            "316998",
            "All Other Leather Good and Allied Product Manufacturing",
        ),
        ("424690", "Other Chemical and Allied Products Merchant Wholesalers"),
    ])
}

/// Input CSV with one row per commodity.
pub fn input_csv(commodities: &[&str]) -> String {
    let mut csv =
        String::from("Commodity,CommodityDescription,ExtendedDescription,ContractName\n");
    for commodity in commodities {
        csv.push_str(&format!(
            "{},GLOVES WORK MECHANIC SYNTHETIC LEATHER SZ LARGE,RC LN QTY DEL,MSC items for Glen Bell warehouse\n",
            commodity
        ));
    }
    csv
}

/// `total` rows of which the first `failing` fail and the next `unmatched`
/// map to a code without an emission factor.
pub fn commodities(total: usize, failing: usize, unmatched: usize) -> Vec<String> {
    (0..total)
        .map(|i| {
            if i < failing {
                format!("{}-{}", FAIL_PREFIX, i)
            } else if i < failing + unmatched {
                format!("{}-{}", UNMATCHED_PREFIX, i)
            } else {
                format!("2014277{:04}", i)
            }
        })
        .collect()
}

pub async fn seeded_store(commodities: &[String]) -> Arc<MemoryObjectStore> {
    let refs: Vec<&str> = commodities.iter().map(String::as_str).collect();
    let store = Arc::new(MemoryObjectStore::new());
    store
        .put(INPUT_KEY, input_csv(&refs).into_bytes())
        .await
        .unwrap();
    store
        .put(FACTORS_KEY, FACTORS_CSV.as_bytes().to_vec())
        .await
        .unwrap();
    store
}

pub fn mapper(
    store: Arc<MemoryObjectStore>,
    llm: Arc<ScriptedLLM>,
    max_concurrency: usize,
    tolerated_failure_percentage: f64,
) -> DistributedMapper {
    let processor = RecordProcessor::new(
        llm,
        Arc::new(taxonomy()),
        RetryPolicy::none(),
        SelectionPrompt::Plain,
    );
    DistributedMapper::new(
        store,
        Arc::new(processor),
        MapperSettings {
            max_concurrency,
            tolerated_failure_percentage,
        },
        Arc::new(NoOpHandler),
    )
}

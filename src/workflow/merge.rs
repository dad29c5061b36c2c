//! Batch merge job
//!
//! Joins the relocated mapping results against the emission-factor table by
//! classification code. Matches go to one consolidated table; records whose
//! chosen code has no factor are surfaced in a separate table.

use super::reconciler::SUCCESSFUL_PREFIX;
use crate::model::{EmissionFactorRow, MappedOutputRecord, RowArtifact};
use crate::storage::{ObjectStore, StoreError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const MATCHED_KEY: &str = "output/matched_factors.csv";
pub const MISMATCHED_KEY: &str = "output/mismatched_factors.csv";

const RECORD_COLUMNS: [&str; 11] = [
    "Commodity",
    "CommodityDescription",
    "ExtendedDescription",
    "ContractName",
    "SimplifiedDescription",
    "PossibleNAICSCode1",
    "PossibleNAICSCode2",
    "PossibleNAICSCode3",
    "MappedNAICSCode",
    "MappedNAICSTitle",
    "MappingJustification",
];
const FACTOR_COLUMNS: [&str; 2] = ["CO2e", "USEEIOCode"];

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid mapping artifact {key}: {message}")]
    InvalidArtifact { key: String, message: String },

    #[error("Failed to read emission factors {key}: {message}")]
    EmissionFactors { key: String, message: String },

    #[error("Failed to write {key}: {message}")]
    Write { key: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub matched: usize,
    pub unmatched: usize,
    pub matched_key: String,
    /// Set only when an unmatched table was written.
    pub unmatched_key: Option<String>,
}

/// Emission factors keyed by trimmed code. The first row for a code wins.
pub fn parse_emission_factors(
    key: &str,
    bytes: &[u8],
) -> Result<HashMap<String, EmissionFactorRow>, MergeError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let mut factors = HashMap::new();
    for row in reader.deserialize::<EmissionFactorRow>() {
        let row = row.map_err(|e| MergeError::EmissionFactors {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        factors.entry(row.code.trim().to_string()).or_insert(row);
    }
    Ok(factors)
}

fn record_fields(record: &MappedOutputRecord) -> Vec<&str> {
    let possible = |pos: usize| record.possible_matches.code(pos).unwrap_or_default();
    vec![
        record.commodity.as_str(),
        record.commodity_description.as_str(),
        record.extended_description.as_str(),
        record.contract_name.as_str(),
        record.simplified_description.as_str(),
        possible(1),
        possible(2),
        possible(3),
        record.mapped_code.as_str(),
        record.mapped_title.as_str(),
        record.justification.as_str(),
    ]
}

fn write_table<'a>(
    key: &str,
    header: &[&str],
    rows: impl IntoIterator<Item = Vec<&'a str>>,
) -> Result<Vec<u8>, MergeError> {
    let failed = |message: String| MergeError::Write {
        key: key.to_string(),
        message,
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header).map_err(|e| failed(e.to_string()))?;
    for row in rows {
        writer.write_record(&row).map_err(|e| failed(e.to_string()))?;
    }
    writer.into_inner().map_err(|e| failed(e.to_string()))
}

pub struct MergeJob {
    store: Arc<dyn ObjectStore>,
    emission_factors_key: String,
}

impl MergeJob {
    pub fn new(store: Arc<dyn ObjectStore>, emission_factors_key: impl Into<String>) -> Self {
        Self {
            store,
            emission_factors_key: emission_factors_key.into(),
        }
    }

    /// Relocated records ordered by row index.
    async fn load_records(&self) -> Result<Vec<MappedOutputRecord>, MergeError> {
        let prefix = format!("{}/", SUCCESSFUL_PREFIX);
        let mut artifacts = Vec::new();
        for key in self.store.list(&prefix).await? {
            if !key.ends_with(".json") {
                continue;
            }
            let bytes = self.store.get(&key).await?;
            let invalid = |message: String| MergeError::InvalidArtifact {
                key: key.clone(),
                message,
            };
            let artifact: RowArtifact =
                serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;
            let output = artifact
                .output
                .ok_or_else(|| invalid("artifact has no mapped output".to_string()))?;
            artifacts.push((artifact.index, output));
        }
        artifacts.sort_by_key(|(index, _)| *index);
        Ok(artifacts.into_iter().map(|(_, output)| output).collect())
    }

    pub async fn run(&self) -> Result<MergeSummary, MergeError> {
        let records = self.load_records().await?;
        let factor_bytes = self.store.get(&self.emission_factors_key).await?;
        let factors = parse_emission_factors(&self.emission_factors_key, &factor_bytes)?;

        let mut matched = Vec::new();
        let mut unmatched = Vec::new();
        for record in &records {
            match factors.get(record.mapped_code.trim()) {
                Some(factor) => matched.push((record, factor)),
                None => unmatched.push(record),
            }
        }

        let matched_header: Vec<&str> = RECORD_COLUMNS
            .iter()
            .chain(&FACTOR_COLUMNS)
            .copied()
            .collect();
        let matched_table = write_table(
            MATCHED_KEY,
            &matched_header,
            matched.iter().map(|(record, factor)| {
                let mut row = record_fields(record);
                row.push(&factor.co2e);
                row.push(&factor.useeio_code);
                row
            }),
        )?;
        self.store.put(MATCHED_KEY, matched_table).await?;

        let unmatched_key = if unmatched.is_empty() {
            self.store.delete(MISMATCHED_KEY).await?;
            None
        } else {
            for record in &unmatched {
                warn!(
                    code = %record.mapped_code,
                    commodity = %record.commodity,
                    "Mapped code has no emission factor"
                );
            }
            let table = write_table(
                MISMATCHED_KEY,
                &RECORD_COLUMNS,
                unmatched.iter().map(|record| record_fields(record)),
            )?;
            self.store.put(MISMATCHED_KEY, table).await?;
            Some(MISMATCHED_KEY.to_string())
        };

        info!(
            records = records.len(),
            matched = matched.len(),
            unmatched = unmatched.len(),
            "Merge complete"
        );

        Ok(MergeSummary {
            matched: matched.len(),
            unmatched: unmatched.len(),
            matched_key: MATCHED_KEY.to_string(),
            unmatched_key,
        })
    }
}

//! Distributed mapper
//!
//! Fans the record processor out over every input row with bounded
//! concurrency, writes one artifact per row and a manifest per run, and
//! decides the run status against the tolerated failure percentage once all
//! rows have finished.

use crate::model::{
    ExecutionManifest, InputRecord, ManifestEntry, RowArtifact, RowError, RowStatus, RunStatus,
    REQUIRED_INPUT_COLUMNS,
};
use crate::pipeline::RecordProcessor;
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::storage::{join_key, ObjectStore, StoreError};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MAPPING_RUNS_PREFIX: &str = "mapping-runs";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Stage recorded for rows whose artifact could not be written.
pub const STORE_STAGE: &str = "store";

#[derive(Debug, Error)]
pub enum MapperError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to read input dataset {key}: {message}")]
    InvalidInput { key: String, message: String },

    #[error("Input dataset {key} is missing required column '{column}'")]
    MissingColumn { key: String, column: String },

    #[error("Failed to serialize {what}: {message}")]
    Serialize { what: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct MapRunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub total_rows: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub manifest_key: String,
}

#[derive(Debug, Clone)]
pub struct MapperSettings {
    pub max_concurrency: usize,
    pub tolerated_failure_percentage: f64,
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            tolerated_failure_percentage: 10.0,
        }
    }
}

/// Reads the input dataset. The header must name the four required
/// columns; short rows read as empty strings for the missing cells.
pub fn parse_input_csv(key: &str, bytes: &[u8]) -> Result<Vec<InputRecord>, MapperError> {
    let invalid = |e: csv::Error| MapperError::InvalidInput {
        key: key.to_string(),
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers().map_err(invalid)?.clone();
    let mut positions = [0usize; 4];
    for (slot, column) in positions.iter_mut().zip(REQUIRED_INPUT_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}') == column)
            .ok_or_else(|| MapperError::MissingColumn {
                key: key.to_string(),
                column: column.to_string(),
            })?;
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(invalid)?;
        let cell = |i: usize| row.get(positions[i]).unwrap_or_default().to_string();
        records.push(InputRecord::new(cell(0), cell(1), cell(2), cell(3)));
    }
    Ok(records)
}

pub fn new_run_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}",
        chrono::Utc::now().format("%Y%m%dT%H%M%SZ"),
        &id[..8]
    )
}

pub fn manifest_key(run_id: &str) -> String {
    join_key(&[MAPPING_RUNS_PREFIX, run_id, MANIFEST_FILE])
}

pub fn row_artifact_key(run_id: &str, status: RowStatus, index: usize) -> String {
    join_key(&[
        MAPPING_RUNS_PREFIX,
        run_id,
        status.as_str(),
        &format!("{}.json", index),
    ])
}

fn to_json<T: Serialize>(what: &str, value: &T) -> Result<Vec<u8>, MapperError> {
    serde_json::to_vec_pretty(value).map_err(|e| MapperError::Serialize {
        what: what.to_string(),
        message: e.to_string(),
    })
}

pub struct DistributedMapper {
    store: Arc<dyn ObjectStore>,
    processor: Arc<RecordProcessor>,
    settings: MapperSettings,
    progress: Arc<dyn ProgressHandler>,
}

impl DistributedMapper {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        processor: Arc<RecordProcessor>,
        settings: MapperSettings,
        progress: Arc<dyn ProgressHandler>,
    ) -> Self {
        Self {
            store,
            processor,
            settings,
            progress,
        }
    }

    pub async fn run(&self, input_key: &str) -> Result<MapRunSummary, MapperError> {
        let bytes = self.store.get(input_key).await?;
        let records = parse_input_csv(input_key, &bytes)?;
        self.run_records(records).await
    }

    pub async fn run_records(
        &self,
        records: Vec<InputRecord>,
    ) -> Result<MapRunSummary, MapperError> {
        let start = Instant::now();
        let run_id = new_run_id();
        let total_rows = records.len();
        let failures = AtomicUsize::new(0);

        self.progress.on_progress(&ProgressEvent::RunStarted {
            run_id: run_id.clone(),
            total_rows,
        });

        let concurrency = self.settings.max_concurrency.max(1);
        let outcomes: Vec<Result<(RowStatus, ManifestEntry), MapperError>> =
            stream::iter(records.into_iter().enumerate())
                .map(|(index, input)| self.map_row(&run_id, index, input, &failures))
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome? {
                (RowStatus::Succeeded, entry) => succeeded.push(entry),
                (RowStatus::Failed, entry) => failed.push(entry),
            }
        }
        debug_assert_eq!(failures.load(Ordering::SeqCst), failed.len());

        let manifest = ExecutionManifest::new(
            run_id.clone(),
            total_rows,
            self.settings.tolerated_failure_percentage,
            succeeded,
            failed,
        );
        let key = manifest_key(&run_id);
        self.store.put(&key, to_json("manifest", &manifest)?).await?;

        info!(
            run_id = %run_id,
            status = %manifest.status,
            failure_pct = manifest.failure_percentage(),
            "Manifest written to {}",
            key
        );

        self.progress.on_progress(&ProgressEvent::RunCompleted {
            run_id: run_id.clone(),
            succeeded: manifest.succeeded.len(),
            failed: manifest.failed.len(),
            status: manifest.status.to_string(),
            duration: start.elapsed(),
        });

        Ok(MapRunSummary {
            run_id,
            status: manifest.status,
            total_rows,
            succeeded: manifest.succeeded.len(),
            failed: manifest.failed.len(),
            manifest_key: key,
        })
    }

    async fn map_row(
        &self,
        run_id: &str,
        index: usize,
        input: InputRecord,
        failures: &AtomicUsize,
    ) -> Result<(RowStatus, ManifestEntry), MapperError> {
        let start = Instant::now();
        self.progress.on_progress(&ProgressEvent::RowStarted { index });

        let artifact = match self.processor.process(&input).await {
            Ok(output) => {
                self.progress.on_progress(&ProgressEvent::RowSucceeded {
                    index,
                    code: output.mapped_code.clone(),
                    duration: start.elapsed(),
                });
                RowArtifact::succeeded(index, input, output)
            }
            Err(failure) => {
                failures.fetch_add(1, Ordering::SeqCst);
                self.progress.on_progress(&ProgressEvent::RowFailed {
                    index,
                    stage: failure.stage.to_string(),
                    error: failure.error.to_string(),
                });
                RowArtifact::failed(
                    index,
                    input,
                    RowError {
                        stage: failure.stage.to_string(),
                        message: failure.error.to_string(),
                    },
                )
            }
        };

        let location = row_artifact_key(run_id, artifact.status, index);
        let store_error = match self
            .store
            .put(&location, to_json("row artifact", &artifact)?)
            .await
        {
            Ok(()) => {
                debug!(row = index, location = %location, "Row artifact written");
                return Ok((artifact.status, ManifestEntry { location, index }));
            }
            Err(e) => e,
        };

        // The row could not be persisted: record it as failed so the manifest
        // still accounts for it.
        warn!(row = index, location = %location, error = %store_error, "Failed to store row artifact");
        if artifact.status == RowStatus::Succeeded {
            failures.fetch_add(1, Ordering::SeqCst);
            self.progress.on_progress(&ProgressEvent::RowFailed {
                index,
                stage: STORE_STAGE.to_string(),
                error: store_error.to_string(),
            });
        }

        let failed = RowArtifact::failed(
            index,
            artifact.input,
            RowError {
                stage: STORE_STAGE.to_string(),
                message: store_error.to_string(),
            },
        );
        let location = row_artifact_key(run_id, RowStatus::Failed, index);
        if let Err(e) = self
            .store
            .put(&location, to_json("row artifact", &failed)?)
            .await
        {
            warn!(row = index, location = %location, error = %e, "Failed to store failure artifact");
        }

        Ok((RowStatus::Failed, ManifestEntry { location, index }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_csv_by_header_name() {
        let csv = "ContractName,Commodity,ExtendedDescription,CommodityDescription,Extra\n\
                   Warehouse,C1,RC LN,GLOVES,x\n\
                   Office,C2\n";
        let records = parse_input_csv("input/a.csv", csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            InputRecord::new("C1", "GLOVES", "RC LN", "Warehouse")
        );
        assert_eq!(records[1], InputRecord::new("C2", "", "", "Office"));
    }

    #[test]
    fn test_parse_input_csv_missing_column() {
        let csv = "Commodity,CommodityDescription,ContractName\nC1,G,W\n";
        let err = parse_input_csv("input/a.csv", csv.as_bytes()).unwrap_err();
        match err {
            MapperError::MissingColumn { column, .. } => {
                assert_eq!(column, "ExtendedDescription")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_keys() {
        assert_eq!(manifest_key("r1"), "mapping-runs/r1/manifest.json");
        assert_eq!(
            row_artifact_key("r1", RowStatus::Failed, 12),
            "mapping-runs/r1/FAILED/12.json"
        );
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(new_run_id(), new_run_id());
    }
}

//! Execution manifest: the authoritative per-run record of row outcomes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

impl RunStatus {
    /// A run fails when the failed share of rows is strictly greater than
    /// the tolerated percentage. An empty dataset succeeds.
    pub fn evaluate(failed: usize, total: usize, tolerated_percentage: f64) -> Self {
        if total == 0 {
            return RunStatus::Succeeded;
        }
        let failed_percentage = failed as f64 * 100.0 / total as f64;
        if failed_percentage > tolerated_percentage {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub location: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionManifest {
    #[serde(rename = "RunId")]
    pub run_id: String,
    #[serde(rename = "Status")]
    pub status: RunStatus,
    #[serde(rename = "TotalRows")]
    pub total_rows: usize,
    #[serde(rename = "ToleratedFailurePercentage")]
    pub tolerated_failure_percentage: f64,
    #[serde(rename = "SUCCEEDED")]
    pub succeeded: Vec<ManifestEntry>,
    #[serde(rename = "FAILED")]
    pub failed: Vec<ManifestEntry>,
}

impl ExecutionManifest {
    /// Builds a manifest from row outcomes, sorting both lists by index and
    /// deriving the run status.
    pub fn new(
        run_id: impl Into<String>,
        total_rows: usize,
        tolerated_failure_percentage: f64,
        mut succeeded: Vec<ManifestEntry>,
        mut failed: Vec<ManifestEntry>,
    ) -> Self {
        succeeded.sort_by_key(|e| e.index);
        failed.sort_by_key(|e| e.index);
        let status = RunStatus::evaluate(failed.len(), total_rows, tolerated_failure_percentage);
        Self {
            run_id: run_id.into(),
            status,
            total_rows,
            tolerated_failure_percentage,
            succeeded,
            failed,
        }
    }

    pub fn failure_percentage(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            self.failed.len() as f64 * 100.0 / self.total_rows as f64
        }
    }

    /// Checks that every row index in `0..TotalRows` appears exactly once
    /// across the two lists.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::with_capacity(self.total_rows);
        for entry in self.succeeded.iter().chain(self.failed.iter()) {
            if entry.index >= self.total_rows {
                return Err(format!(
                    "row index {} is out of range for {} rows",
                    entry.index, self.total_rows
                ));
            }
            if !seen.insert(entry.index) {
                return Err(format!("row index {} is listed more than once", entry.index));
            }
        }
        if seen.len() != self.total_rows {
            return Err(format!(
                "manifest lists {} of {} rows",
                seen.len(),
                self.total_rows
            ));
        }
        Ok(())
    }
}

//! Result reconciler
//!
//! Relocates the successful row artifacts of one map run into the fixed
//! `successful-mappings/` area the merge job reads from.

use crate::model::{ExecutionManifest, RunStatus};
use crate::storage::{join_key, ObjectStore, StoreError};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub const SUCCESSFUL_PREFIX: &str = "successful-mappings";

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid manifest {key}: {message}")]
    InvalidManifest { key: String, message: String },

    #[error("Run {run_id} failed ({failed} of {total} rows); refusing to reconcile")]
    RunFailed {
        run_id: String,
        failed: usize,
        total: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub relocated: usize,
    pub removed_stale: usize,
    pub skipped_failed: usize,
}

/// Destination key of a relocated success, derived from its manifest index.
pub fn relocated_key(index: usize) -> String {
    join_key(&[SUCCESSFUL_PREFIX, &format!("SUCCEEDED_{}.json", index)])
}

pub async fn load_manifest(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<ExecutionManifest, ReconcileError> {
    let bytes = store.get(key).await?;
    let manifest: ExecutionManifest =
        serde_json::from_slice(&bytes).map_err(|e| ReconcileError::InvalidManifest {
            key: key.to_string(),
            message: e.to_string(),
        })?;
    manifest
        .validate()
        .map_err(|message| ReconcileError::InvalidManifest {
            key: key.to_string(),
            message,
        })?;
    Ok(manifest)
}

pub struct ResultReconciler {
    store: Arc<dyn ObjectStore>,
}

impl ResultReconciler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn reconcile(&self, manifest_key: &str) -> Result<ReconcileSummary, ReconcileError> {
        let manifest = load_manifest(self.store.as_ref(), manifest_key).await?;
        self.reconcile_manifest(&manifest).await
    }

    pub async fn reconcile_manifest(
        &self,
        manifest: &ExecutionManifest,
    ) -> Result<ReconcileSummary, ReconcileError> {
        if manifest.status == RunStatus::Failed {
            return Err(ReconcileError::RunFailed {
                run_id: manifest.run_id.clone(),
                failed: manifest.failed.len(),
                total: manifest.total_rows,
            });
        }

        let mut expected = HashSet::with_capacity(manifest.succeeded.len());
        for entry in &manifest.succeeded {
            let destination = relocated_key(entry.index);
            self.store.copy(&entry.location, &destination).await?;
            debug!(row = entry.index, from = %entry.location, to = %destination, "Relocated");
            expected.insert(destination);
        }

        let mut removed_stale = 0;
        let prefix = format!("{}/", SUCCESSFUL_PREFIX);
        for key in self.store.list(&prefix).await? {
            if !expected.contains(&key) {
                self.store.delete(&key).await?;
                removed_stale += 1;
            }
        }

        let summary = ReconcileSummary {
            relocated: manifest.succeeded.len(),
            removed_stale,
            skipped_failed: manifest.failed.len(),
        };
        info!(
            run_id = %manifest.run_id,
            relocated = summary.relocated,
            removed_stale = summary.removed_stale,
            skipped_failed = summary.skipped_failed,
            "Reconciliation complete"
        );
        Ok(summary)
    }
}

//! Output formatting for command results
//!
//! JSON and YAML render the summary structs as-is; the human format prints a
//! short report for a terminal.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;

use crate::config::EifmapConfig;
use crate::workflow::{MapRunSummary, MergeSummary, ReconcileSummary, WorkflowContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (human-friendly, version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn serialized<T: Serialize>(&self, value: &T, what: &str) -> Result<Option<String>> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(value)
                .with_context(|| format!("Failed to serialize {} to JSON", what))
                .map(Some),
            OutputFormat::Yaml => serde_yaml::to_string(value)
                .with_context(|| format!("Failed to serialize {} to YAML", what))
                .map(Some),
            OutputFormat::Human => Ok(None),
        }
    }

    /// Whatever phases of a full run completed
    pub fn format_run(&self, context: &WorkflowContext) -> Result<String> {
        if let Some(out) = self.serialized(context, "workflow result")? {
            return Ok(out);
        }

        let mut out = String::new();
        if let Some(map) = &context.map {
            out.push_str(&human_map(map));
        }
        if let Some(reconcile) = &context.reconcile {
            out.push('\n');
            out.push_str(&human_reconcile(reconcile));
        }
        if let Some(merge) = &context.merge {
            out.push('\n');
            out.push_str(&human_merge(merge));
        }
        Ok(out)
    }

    pub fn format_map(&self, summary: &MapRunSummary) -> Result<String> {
        Ok(self
            .serialized(summary, "map summary")?
            .unwrap_or_else(|| human_map(summary)))
    }

    pub fn format_reconcile(&self, summary: &ReconcileSummary) -> Result<String> {
        Ok(self
            .serialized(summary, "reconcile summary")?
            .unwrap_or_else(|| human_reconcile(summary)))
    }

    pub fn format_merge(&self, summary: &MergeSummary) -> Result<String> {
        Ok(self
            .serialized(summary, "merge summary")?
            .unwrap_or_else(|| human_merge(summary)))
    }

    pub fn format_config(&self, config: &EifmapConfig) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&sorted(config))
                .context("Failed to serialize config to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(&sorted(config)).context("Failed to serialize config to YAML")
            }
            OutputFormat::Human => Ok(config.to_string()),
        }
    }
}

fn sorted(config: &EifmapConfig) -> std::collections::BTreeMap<String, String> {
    config.to_display_map().into_iter().collect()
}

fn human_map(summary: &MapRunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Map run {}: {}", summary.run_id, summary.status);
    let _ = writeln!(
        out,
        "  Rows: {} total, {} succeeded, {} failed",
        summary.total_rows, summary.succeeded, summary.failed
    );
    let _ = writeln!(out, "  Manifest: {}", summary.manifest_key);
    out
}

fn human_reconcile(summary: &ReconcileSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Reconciled:");
    let _ = writeln!(out, "  Relocated: {}", summary.relocated);
    let _ = writeln!(out, "  Skipped (failed): {}", summary.skipped_failed);
    if summary.removed_stale > 0 {
        let _ = writeln!(out, "  Removed stale: {}", summary.removed_stale);
    }
    out
}

fn human_merge(summary: &MergeSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Merged:");
    let _ = writeln!(out, "  Matched: {} -> {}", summary.matched, summary.matched_key);
    match &summary.unmatched_key {
        Some(key) => {
            let _ = writeln!(out, "  Unmatched: {} -> {}", summary.unmatched, key);
        }
        None => {
            let _ = writeln!(out, "  Unmatched: none");
        }
    }
    out
}

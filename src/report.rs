//! Scrub Report: the audit trail of one pipeline run.
//!
//! The report is assembled from the per-stage reports, serialized as JSON
//! next to the prepared file, and summarized to the log. Nothing in it feeds
//! back into the prepared output, so two runs over the same input produce
//! identical prepared bytes even though their run ids and timestamps differ.

use std::{collections::BTreeMap, io::Write, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    coerce::{CellIssue, CoercionReport},
    columns::ColumnReport,
    dedup::DedupReport,
    domain::DomainReport,
    io_utils,
    missing::{MissingCounts, MissingReport},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamedColumn {
    pub raw: String,
    pub canonical: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputInfo {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrubReport {
    pub run_id: Uuid,
    pub dataset: String,
    pub generated_at: DateTime<Utc>,
    pub strict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<InputInfo>,
    pub input_rows: usize,
    pub output_rows: usize,
    pub renamed_columns: Vec<RenamedColumn>,
    pub ignored_columns: Vec<String>,
    pub duplicate_key: Vec<String>,
    pub duplicates_removed: usize,
    pub missing: BTreeMap<String, MissingCounts>,
    pub coercion_failures: Vec<CellIssue>,
    pub rows_dropped_invalid: usize,
    pub out_of_range: Vec<CellIssue>,
    pub rows_dropped_strict: usize,
    pub standardized_values: BTreeMap<String, usize>,
    pub unmapped_values: BTreeMap<String, BTreeMap<String, usize>>,
}

impl ScrubReport {
    pub fn new(dataset: &str, strict: bool, input_rows: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            dataset: dataset.to_string(),
            generated_at: Utc::now(),
            strict,
            input: None,
            input_rows,
            output_rows: 0,
            renamed_columns: Vec::new(),
            ignored_columns: Vec::new(),
            duplicate_key: Vec::new(),
            duplicates_removed: 0,
            missing: BTreeMap::new(),
            coercion_failures: Vec::new(),
            rows_dropped_invalid: 0,
            out_of_range: Vec::new(),
            rows_dropped_strict: 0,
            standardized_values: BTreeMap::new(),
            unmapped_values: BTreeMap::new(),
        }
    }

    pub fn record_columns(&mut self, stage: ColumnReport) {
        self.renamed_columns = stage
            .renamed
            .into_iter()
            .map(|(raw, canonical)| RenamedColumn { raw, canonical })
            .collect();
    }

    pub fn record_dedup(&mut self, stage: DedupReport) {
        self.duplicate_key = stage.key;
        self.duplicates_removed = stage.duplicates_removed;
    }

    pub fn record_missing(&mut self, stage: &MissingReport) {
        self.missing = stage.columns.clone();
    }

    pub fn record_coercion(&mut self, stage: CoercionReport) {
        self.coercion_failures = stage.failures;
        self.rows_dropped_invalid = stage.rows_dropped_invalid;
        self.out_of_range = stage.out_of_range;
        self.rows_dropped_strict = stage.rows_dropped_strict;
        self.ignored_columns = stage.ignored_columns;
    }

    pub fn record_domain(&mut self, stage: DomainReport) {
        self.standardized_values = stage.standardized;
        self.unmapped_values = stage.unmapped;
    }

    pub fn rows_dropped_missing(&self) -> usize {
        self.missing.values().map(|c| c.rows_dropped).sum()
    }

    pub fn cells_filled(&self) -> usize {
        self.missing.values().map(|c| c.cells_filled).sum()
    }

    pub fn has_warnings(&self) -> bool {
        !self.out_of_range.is_empty()
            || !self.unmapped_values.is_empty()
            || !self.coercion_failures.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing scrub report")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        io_utils::write_atomically(path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, self).context("Writing scrub report JSON")?;
            writer.write_all(b"\n").context("Writing scrub report JSON")
        })
    }

    /// Mirrors the report into the log: a summary line plus one warning per
    /// non-fatal finding category.
    pub fn log_summary(&self) {
        info!(
            "[{}] {} -> {} row(s): {} duplicate(s), {} dropped for missing values, {} cell(s) filled, {} dropped as invalid, {} dropped in strict mode",
            self.dataset,
            self.input_rows,
            self.output_rows,
            self.duplicates_removed,
            self.rows_dropped_missing(),
            self.cells_filled(),
            self.rows_dropped_invalid,
            self.rows_dropped_strict
        );
        if !self.renamed_columns.is_empty() {
            info!(
                "[{}] Renamed columns: {}",
                self.dataset,
                self.renamed_columns
                    .iter()
                    .map(|r| format!("'{}' -> '{}'", r.raw, r.canonical))
                    .join(", ")
            );
        }
        if !self.ignored_columns.is_empty() {
            info!(
                "[{}] Ignored undeclared columns: {}",
                self.dataset,
                self.ignored_columns.join(", ")
            );
        }
        if !self.coercion_failures.is_empty() {
            warn!(
                "[{}] {} cell(s) failed coercion and were absorbed by policy",
                self.dataset,
                self.coercion_failures.len()
            );
        }
        for (column, issues) in &self.out_of_range.iter().chunk_by(|issue| issue.column.clone()) {
            let lines = issues.map(|issue| issue.line).collect::<Vec<_>>();
            warn!(
                "[{}] {} value(s) out of range in '{}' (lines {})",
                self.dataset,
                lines.len(),
                column,
                lines.iter().take(10).join(", ")
            );
        }
        for (column, values) in &self.unmapped_values {
            warn!(
                "[{}] Unmapped values in '{}': {}",
                self.dataset,
                column,
                values
                    .iter()
                    .map(|(value, count)| format!("{value} ({count})"))
                    .join(", ")
            );
        }
    }
}

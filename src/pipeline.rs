//! Scrubbing Pipeline: threads a raw table through every stage in a fixed
//! order and folds the stage reports into one [`ScrubReport`].
//!
//! Column Standardizer → Deduplicator → Missing-Value Handler →
//! Type Coercer & Validator → Domain Standardizer.
//!
//! Each stage returns a new table; the input is never touched. The first
//! structural or fatal coercion error aborts the run, and nothing is
//! returned for the caller to persist.

use std::fmt;

use log::debug;

use crate::{
    coerce::{self, CoerceOptions},
    columns, dedup, domain,
    error::{SchemaError, ScrubError},
    missing,
    report::ScrubReport,
    schema::Schema,
    table::Table,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrubOptions {
    /// Drop rows that break a validation rule instead of flagging them.
    pub strict: bool,
    /// Keep a copy of the table after every stage in the outcome.
    pub keep_stages: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Columns,
    Dedup,
    Missing,
    Coerce,
    Domain,
}

impl Stage {
    pub const ORDER: [Stage; 5] = [
        Stage::Columns,
        Stage::Dedup,
        Stage::Missing,
        Stage::Coerce,
        Stage::Domain,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Columns => "column standardizer",
            Stage::Dedup => "deduplicator",
            Stage::Missing => "missing-value handler",
            Stage::Coerce => "type coercer",
            Stage::Domain => "domain standardizer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct ScrubOutcome {
    pub prepared: Table,
    pub report: ScrubReport,
    /// Table after each stage, in execution order. Empty unless
    /// `keep_stages` was requested.
    pub stages: Vec<(Stage, Table)>,
}

impl ScrubOutcome {
    pub fn stage(&self, stage: Stage) -> Option<&Table> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, table)| table)
    }
}

#[derive(Debug, Clone)]
pub struct Scrubber {
    schema: Schema,
    options: ScrubOptions,
}

impl Scrubber {
    pub fn new(schema: Schema, options: ScrubOptions) -> Result<Self, SchemaError> {
        schema.validate()?;
        Ok(Self { schema, options })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> ScrubOptions {
        self.options
    }

    pub fn scrub(&self, raw: &Table) -> Result<ScrubOutcome, ScrubError> {
        let schema = &self.schema;
        let mut report = ScrubReport::new(&schema.dataset, self.options.strict, raw.len());
        let mut stages = Vec::new();
        let mut keep = |stage: Stage, table: &Table| {
            debug!("[{}] {} produced {} row(s)", schema.dataset, stage, table.len());
            if self.options.keep_stages {
                stages.push((stage, table.clone()));
            }
        };

        let (table, column_report) = columns::standardize(raw, Some(schema))?;
        self.ensure_columns(&table)?;
        report.record_columns(column_report);
        keep(Stage::Columns, &table);

        let (table, dedup_report) = dedup::deduplicate(&table, schema)?;
        report.record_dedup(dedup_report);
        keep(Stage::Dedup, &table);

        let (table, missing_report) = missing::handle_missing(&table, schema)?;
        report.record_missing(&missing_report);
        keep(Stage::Missing, &table);

        let (table, coercion_report) = coerce::coerce(
            &table,
            schema,
            &missing_report.fill_values,
            CoerceOptions {
                strict: self.options.strict,
            },
        )?;
        report.record_coercion(coercion_report);
        keep(Stage::Coerce, &table);

        let (table, domain_report) = domain::standardize_domain(&table, schema);
        report.record_domain(domain_report);
        keep(Stage::Domain, &table);

        report.output_rows = table.len();
        Ok(ScrubOutcome {
            prepared: table,
            report,
            stages,
        })
    }

    fn ensure_columns(&self, table: &Table) -> Result<(), SchemaError> {
        match self
            .schema
            .columns
            .iter()
            .find(|column| table.column_index(&column.name).is_none())
        {
            Some(column) => Err(SchemaError::MissingColumn {
                dataset: self.schema.dataset.clone(),
                column: column.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

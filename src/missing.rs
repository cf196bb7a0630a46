//! Missing-Value Handler.
//!
//! Drop policies run first so no effort is spent filling rows that are about
//! to be discarded; fill policies run second over the surviving rows. Only
//! missing cells (`None`) are touched: a present `0` is a value, not a gap.

use std::collections::BTreeMap;

use itertools::Itertools;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::{
    data::Value,
    error::SchemaError,
    schema::{ColumnSpec, DEFAULT_TEXT_FILL, MissingPolicy, Schema, SemanticType},
    table::{Row, Table},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MissingCounts {
    pub rows_dropped: usize,
    pub cells_filled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MissingReport {
    pub columns: BTreeMap<String, MissingCounts>,
    /// Resolved fill value per fill-policy column, reused by the coercer for
    /// cells it has to null out.
    pub fill_values: BTreeMap<String, Value>,
}

impl MissingReport {
    pub fn rows_dropped(&self) -> usize {
        self.columns.values().map(|c| c.rows_dropped).sum()
    }

    pub fn cells_filled(&self) -> usize {
        self.columns.values().map(|c| c.cells_filled).sum()
    }
}

fn policy_columns<'a>(
    table: &Table,
    schema: &'a Schema,
) -> Result<Vec<(usize, &'a ColumnSpec, &'a MissingPolicy)>, SchemaError> {
    schema
        .columns
        .iter()
        .filter_map(|column| column.missing.as_ref().map(|policy| (column, policy)))
        .map(|(column, policy)| {
            table
                .column_index(&column.name)
                .map(|idx| (idx, column, policy))
                .ok_or_else(|| SchemaError::MissingColumn {
                    dataset: schema.dataset.clone(),
                    column: column.name.clone(),
                })
        })
        .collect()
}

pub fn handle_missing(table: &Table, schema: &Schema) -> Result<(Table, MissingReport), SchemaError> {
    let columns = policy_columns(table, schema)?;
    let mut report = MissingReport::default();
    for (_, column, _) in &columns {
        report.columns.insert(column.name.clone(), MissingCounts::default());
    }

    let drop_columns = columns
        .iter()
        .filter(|(_, _, policy)| !policy.is_fill())
        .collect::<Vec<_>>();
    let mut rows: Vec<Row> = Vec::with_capacity(table.len());
    for row in table.rows() {
        let offending = drop_columns
            .iter()
            .find(|(idx, _, _)| row.cells[*idx].is_none());
        match offending {
            Some((_, column, _)) => {
                if let Some(counts) = report.columns.get_mut(&column.name) {
                    counts.rows_dropped += 1;
                }
            }
            None => rows.push(row.clone()),
        }
    }

    for (idx, column, policy) in columns.iter().filter(|(_, _, policy)| policy.is_fill()) {
        let Some(fill) = resolve_fill(column, policy, rows.iter().filter_map(|r| r.cells[*idx].as_ref()))
        else {
            continue;
        };
        let mut filled = 0usize;
        for row in rows.iter_mut().filter(|r| r.cells[*idx].is_none()) {
            row.cells[*idx] = Some(fill.clone());
            filled += 1;
        }
        if let Some(counts) = report.columns.get_mut(&column.name) {
            counts.cells_filled = filled;
        }
        report.fill_values.insert(column.name.clone(), fill);
    }

    Ok((table.with_rows(rows), report))
}

/// Fill value for a column, in raw (text) form. `None` when a statistical
/// policy has nothing to compute from.
pub fn resolve_fill<'a, I>(column: &ColumnSpec, policy: &MissingPolicy, present: I) -> Option<Value>
where
    I: Iterator<Item = &'a Value>,
{
    match policy {
        MissingPolicy::DropRow => None,
        MissingPolicy::FillWith(value) => Some(Value::text(value.clone())),
        MissingPolicy::FillDefault => Some(Value::text(default_fill(column.semantic)?)),
        MissingPolicy::FillMedian => {
            let median = median(present.filter_map(Value::as_decimal).collect())?;
            let median = if column.semantic == SemanticType::Decimal {
                median.normalize()
            } else {
                median.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            };
            Some(Value::text(median.to_string()))
        }
        MissingPolicy::FillMode => mode(present.map(Value::as_display)).map(Value::Text),
    }
}

fn default_fill(semantic: SemanticType) -> Option<&'static str> {
    match semantic {
        SemanticType::Integer | SemanticType::ForeignKey | SemanticType::Decimal => Some("0"),
        SemanticType::Text => Some(DEFAULT_TEXT_FILL),
        SemanticType::Date => None,
    }
}

fn median(mut values: Vec<Decimal>) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        let (low, high) = (values[mid - 1], values[mid]);
        Some(
            low.checked_add(high)
                .map(|sum| sum / Decimal::TWO)
                .unwrap_or_else(|| low + (high - low) / Decimal::TWO),
        )
    }
}

/// Most frequent value; ties go to the value seen first.
fn mode<I: Iterator<Item = String>>(values: I) -> Option<String> {
    let ordered = values.collect::<Vec<_>>();
    let counts = ordered.iter().counts();
    ordered
        .iter()
        .unique()
        .fold(None::<(&String, usize)>, |best, value| {
            let count = counts.get(value).copied().unwrap_or_default();
            match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((value, count)),
            }
        })
        .map(|(value, _)| value.clone())
}

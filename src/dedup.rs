//! Deduplicator: keeps the first record seen per key.
//!
//! Key cells are compared after coercion to their declared type, so `12`
//! and `12.0` in an integer key are the same customer. A cell that does not
//! coerce is compared by its raw text.

use std::collections::HashSet;

use crate::{
    coerce::coerce_value,
    data::{Cell, Value},
    error::SchemaError,
    schema::{ColumnSpec, Schema},
    table::Table,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DedupReport {
    pub key: Vec<String>,
    pub duplicates_removed: usize,
    /// Source lines of the removed rows.
    pub removed_lines: Vec<usize>,
}

/// Removes rows whose natural-key cells repeat an earlier row. An empty key
/// compares whole rows. Relative order of the survivors is preserved.
pub fn deduplicate(table: &Table, schema: &Schema) -> Result<(Table, DedupReport), SchemaError> {
    let key = &schema.natural_key;
    let indices = if key.is_empty() {
        (0..table.headers().len()).collect::<Vec<_>>()
    } else {
        key.iter()
            .map(|column| {
                table
                    .column_index(column)
                    .ok_or_else(|| SchemaError::MissingKeyColumn {
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    let specs = indices
        .iter()
        .map(|&idx| schema.column(&table.headers()[idx]))
        .collect::<Vec<_>>();

    let mut seen: HashSet<Vec<Cell>> = HashSet::with_capacity(table.len());
    let mut kept = Vec::with_capacity(table.len());
    let mut removed_lines = Vec::new();
    for row in table.rows() {
        let signature = indices
            .iter()
            .zip(&specs)
            .map(|(&idx, spec)| normalized(&row.cells[idx], *spec))
            .collect::<Vec<_>>();
        if seen.insert(signature) {
            kept.push(row.clone());
        } else {
            removed_lines.push(row.line);
        }
    }

    let report = DedupReport {
        key: key.to_vec(),
        duplicates_removed: removed_lines.len(),
        removed_lines,
    };
    Ok((table.with_rows(kept), report))
}

fn normalized(cell: &Cell, spec: Option<&ColumnSpec>) -> Cell {
    match (cell, spec) {
        (Some(value), Some(spec)) => Some(coerce_value(value, spec).unwrap_or_else(|_| value.clone())),
        _ => cell.clone(),
    }
}

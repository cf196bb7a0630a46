//! Column Standardizer: canonical snake-case column names.
//!
//! Raw headers are trimmed and converted with `heck`, so `" Customer ID "`,
//! `"CustomerID"` and `"customer_id"` all become `customer_id`. Canonical
//! names declared as aliases in the descriptor are then renamed to their
//! target column. Two source columns landing on the same final name is an
//! ambiguous mapping and fails the run.

use std::collections::HashMap;

use heck::ToSnakeCase;

use crate::{error::SchemaError, schema::Schema, table::Table};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnReport {
    /// `(raw, final)` pairs for every header that changed.
    pub renamed: Vec<(String, String)>,
}

/// Canonical form of a single raw column name. Idempotent.
pub fn canonical_name(raw: &str) -> String {
    raw.trim().to_snake_case()
}

/// Canonical names for a header row, failing on collisions.
pub fn standardize_names(raw: &[String], schema: Option<&Schema>) -> Result<Vec<String>, SchemaError> {
    let mut claimed: HashMap<String, &str> = HashMap::with_capacity(raw.len());
    let mut names = Vec::with_capacity(raw.len());
    for original in raw {
        let canonical = canonical_name(original);
        let resolved = schema
            .and_then(|s| s.alias_target(&canonical))
            .map(str::to_string)
            .unwrap_or(canonical);
        if let Some(first) = claimed.insert(resolved.clone(), original.as_str()) {
            return Err(SchemaError::AmbiguousColumn {
                first: first.to_string(),
                second: original.clone(),
                canonical: resolved,
            });
        }
        names.push(resolved);
    }
    Ok(names)
}

pub fn standardize(table: &Table, schema: Option<&Schema>) -> Result<(Table, ColumnReport), SchemaError> {
    let names = standardize_names(table.headers(), schema)?;
    let renamed = table
        .headers()
        .iter()
        .zip(&names)
        .filter(|(raw, canonical)| raw != canonical)
        .map(|(raw, canonical)| (raw.clone(), canonical.clone()))
        .collect();
    Ok((table.with_headers(names), ColumnReport { renamed }))
}

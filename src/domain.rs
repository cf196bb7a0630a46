//! Domain Standardizer: maps categorical text onto controlled vocabularies.
//!
//! Matching ignores case, whitespace, `_` and `-`, so `"in store"`,
//! `"In-Store"` and `"INSTORE"` all hit the canonical `InStore`. Values with
//! no match pass through untouched and are counted for manual review.

use std::{
    collections::{BTreeMap, HashMap},
    sync::LazyLock,
};

use regex::Regex;

use crate::{
    data::Value,
    schema::{Schema, Vocabulary},
    table::Table,
};

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_\-]+").expect("separator pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainReport {
    /// Cells rewritten to a canonical spelling, per column.
    pub standardized: BTreeMap<String, usize>,
    /// Unmatched values and their occurrence counts, per column.
    pub unmapped: BTreeMap<String, BTreeMap<String, usize>>,
}

impl DomainReport {
    pub fn unmapped_total(&self) -> usize {
        self.unmapped.values().flat_map(|m| m.values()).sum()
    }
}

fn match_key(value: &str) -> String {
    SEPARATORS.replace_all(value.trim(), "").to_lowercase()
}

/// Lookup from normalized spelling to canonical value.
struct Matcher {
    lookup: HashMap<String, String>,
}

impl Matcher {
    fn new(vocabulary: &Vocabulary) -> Self {
        let mut lookup = HashMap::new();
        for canonical in &vocabulary.canonical {
            lookup.insert(match_key(canonical), canonical.clone());
        }
        for (synonym, canonical) in &vocabulary.synonyms {
            lookup
                .entry(match_key(synonym))
                .or_insert_with(|| canonical.clone());
        }
        Self { lookup }
    }

    fn resolve(&self, value: &str) -> Option<&str> {
        self.lookup.get(&match_key(value)).map(String::as_str)
    }
}

pub fn standardize_domain(table: &Table, schema: &Schema) -> (Table, DomainReport) {
    let matchers = schema
        .columns
        .iter()
        .filter_map(|column| {
            let vocabulary = column.vocabulary.as_ref()?;
            let idx = table.column_index(&column.name)?;
            Some((idx, column.name.as_str(), Matcher::new(vocabulary)))
        })
        .collect::<Vec<_>>();

    let mut report = DomainReport::default();
    if matchers.is_empty() {
        return (table.clone(), report);
    }

    let mut rows = table.rows().to_vec();
    for (idx, name, matcher) in &matchers {
        for row in rows.iter_mut() {
            let Some(Value::Text(current)) = &row.cells[*idx] else {
                continue;
            };
            match matcher.resolve(current) {
                Some(canonical) if canonical != current.as_str() => {
                    let canonical = canonical.to_string();
                    row.cells[*idx] = Some(Value::Text(canonical));
                    *report.standardized.entry(name.to_string()).or_default() += 1;
                }
                Some(_) => {}
                None => {
                    *report
                        .unmapped
                        .entry(name.to_string())
                        .or_default()
                        .entry(current.clone())
                        .or_default() += 1;
                }
            }
        }
    }
    (table.with_rows(rows), report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, SemanticType};

    fn schema() -> Schema {
        Schema::new(
            "customers",
            &[],
            vec![
                ColumnSpec::new("region", SemanticType::Text)
                    .vocabulary(Vocabulary::new(["East", "West", "South-West"])),
                ColumnSpec::new("engagement_style", SemanticType::Text).vocabulary(
                    Vocabulary::new(["Mobile", "Desktop", "InStore"])
                        .synonym("Kiosk", "InStore")
                        .synonym("Tablet", "Mobile"),
                ),
            ],
        )
    }

    #[test]
    fn canonicalizes_case_and_separators() {
        let table = Table::from_raw(
            ["region", "engagement_style"],
            vec![
                vec!["east", "in store"],
                vec!["SOUTH WEST", "kiosk"],
                vec!["West", "Tablet"],
            ],
        );
        let (out, report) = standardize_domain(&table, &schema());
        assert_eq!(out.cell(0, "region"), Some(&Some(Value::text("East"))));
        assert_eq!(out.cell(0, "engagement_style"), Some(&Some(Value::text("InStore"))));
        assert_eq!(out.cell(1, "region"), Some(&Some(Value::text("South-West"))));
        assert_eq!(out.cell(1, "engagement_style"), Some(&Some(Value::text("InStore"))));
        assert_eq!(out.cell(2, "engagement_style"), Some(&Some(Value::text("Mobile"))));
        assert_eq!(report.standardized["region"], 2);
        assert_eq!(report.standardized["engagement_style"], 3);
        assert_eq!(report.unmapped_total(), 0);
    }

    #[test]
    fn unmatched_values_pass_through_and_are_reported() {
        let table = Table::from_raw(
            ["region", "engagement_style"],
            vec![vec!["Atlantis", ""], vec!["Atlantis", "Mobile"]],
        );
        let (out, report) = standardize_domain(&table, &schema());
        assert_eq!(out.cell(0, "region"), Some(&Some(Value::text("Atlantis"))));
        assert_eq!(out.cell(0, "engagement_style"), Some(&None));
        assert_eq!(report.unmapped["region"]["Atlantis"], 2);
        assert!(!report.standardized.contains_key("engagement_style"));
    }

    #[test]
    fn standardizing_twice_changes_nothing() {
        let table = Table::from_raw(["region", "engagement_style"], vec![vec!["east", "kiosk"]]);
        let (once, _) = standardize_domain(&table, &schema());
        let (twice, report) = standardize_domain(&once, &schema());
        assert_eq!(once, twice);
        assert!(report.standardized.is_empty());
    }
}

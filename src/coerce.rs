//! Type Coercer & Validator.
//!
//! Enforces the Schema Descriptor on every cell: integers and foreign keys
//! must be whole numbers (foreign keys also non-negative), decimals are
//! exact `rust_decimal` values rescaled to the declared scale, and dates are
//! parsed from a fixed list of accepted formats. The output table is
//! projected onto the descriptor's column order.
//!
//! A cell that fails coercion follows the column's `on_invalid` policy. With
//! `set_null` the cell is handed to the column's missing-value policy: a
//! `drop_row` policy drops the row, a fill policy reuses the value the
//! Missing-Value Handler resolved. Whatever is still empty in a non-nullable
//! column afterwards is fatal and reported in one [`CoercionError`].
//!
//! Rule violations (ranges, allowed sets, outliers) are only flagged unless
//! strict mode is on, in which case the row is dropped. Outlier bounds are
//! computed over every row that survived coercion.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::Serialize;

use crate::{
    data::{Cell, Value, parse_decimal, parse_naive_date, parse_whole_number},
    error::{CellFailure, CoercionError, ScrubError, SchemaError},
    schema::{ColumnSpec, InvalidPolicy, MissingPolicy, Schema, SemanticType, ValidationRule},
    table::{Row, Table},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoerceOptions {
    /// Drop rows that violate a validation rule instead of flagging them.
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueAction {
    RowDropped,
    Filled,
    Nulled,
    Flagged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellIssue {
    pub line: usize,
    pub column: String,
    pub value: String,
    pub reason: String,
    pub action: IssueAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoercionReport {
    /// Coercion failures absorbed by a drop or fill policy.
    pub failures: Vec<CellIssue>,
    pub rows_dropped_invalid: usize,
    pub out_of_range: Vec<CellIssue>,
    pub rows_dropped_strict: usize,
    /// Source columns not declared by the descriptor.
    pub ignored_columns: Vec<String>,
}

enum CellOutcome {
    Value(Cell),
    DropRow,
}

pub fn coerce(
    table: &Table,
    schema: &Schema,
    fill_values: &BTreeMap<String, Value>,
    options: CoerceOptions,
) -> Result<(Table, CoercionReport), ScrubError> {
    let indices = schema
        .columns
        .iter()
        .map(|column| {
            table
                .column_index(&column.name)
                .ok_or_else(|| SchemaError::MissingColumn {
                    dataset: schema.dataset.clone(),
                    column: column.name.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut report = CoercionReport {
        ignored_columns: table
            .headers()
            .iter()
            .filter(|h| schema.column(h).is_none())
            .cloned()
            .collect(),
        ..CoercionReport::default()
    };
    let mut fatal = Vec::new();
    let mut survivors = Vec::with_capacity(table.len());

    for row in table.rows() {
        let mut cells = Vec::with_capacity(schema.columns.len());
        let mut issues = Vec::new();
        let mut row_fatal = Vec::new();
        let mut dropped = false;

        for (column, &idx) in schema.columns.iter().zip(&indices) {
            let raw = &row.cells[idx];
            let outcome = match raw {
                None => CellOutcome::Value(None),
                Some(value) => match coerce_value(value, column) {
                    Ok(coerced) => CellOutcome::Value(Some(coerced)),
                    Err(reason) => {
                        let shown = value.as_display();
                        let (outcome, action) = resolve_invalid(
                            column,
                            fill_values,
                            (row.line, &shown, &reason),
                            &mut row_fatal,
                        );
                        if let Some(action) = action {
                            issues.push(issue(row.line, column, shown, reason, action));
                        }
                        outcome
                    }
                },
            };
            match outcome {
                CellOutcome::DropRow => dropped = true,
                CellOutcome::Value(cell) => {
                    let already_failed = row_fatal
                        .iter()
                        .any(|f: &CellFailure| f.column == column.name);
                    if cell.is_none() && !column.nullable() && !already_failed {
                        row_fatal.push(CellFailure {
                            line: row.line,
                            column: column.name.clone(),
                            value: raw.as_ref().map(Value::as_display).unwrap_or_default(),
                            reason: "required value is missing".to_string(),
                        });
                    }
                    cells.push(cell);
                }
            }
        }

        report.failures.extend(issues);
        if dropped {
            report.rows_dropped_invalid += 1;
            continue;
        }
        if !row_fatal.is_empty() {
            fatal.extend(row_fatal);
            continue;
        }
        survivors.push(Row::new(row.line, cells));
    }

    if !fatal.is_empty() {
        return Err(CoercionError {
            dataset: schema.dataset.clone(),
            failures: fatal,
        }
        .into());
    }

    let checks = schema
        .columns
        .iter()
        .enumerate()
        .map(|(position, column)| {
            column
                .rules
                .iter()
                .map(|rule| {
                    let present = survivors.iter().filter_map(|r| r.cells[position].as_ref());
                    RuleCheck::resolve(rule, present)
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::with_capacity(survivors.len());
    for row in survivors {
        let violations = schema
            .columns
            .iter()
            .zip(&checks)
            .zip(&row.cells)
            .filter_map(|((column, checks), cell)| {
                let value = cell.as_ref()?;
                let failed = checks.iter().find(|check| !check.satisfied_by(value))?;
                Some((column, value.as_display(), failed.violation()))
            })
            .collect::<Vec<_>>();
        let action = if options.strict && !violations.is_empty() {
            IssueAction::RowDropped
        } else {
            IssueAction::Flagged
        };
        for (column, value, reason) in violations {
            report
                .out_of_range
                .push(issue(row.line, column, value, reason, action));
        }
        if action == IssueAction::RowDropped {
            report.rows_dropped_strict += 1;
            continue;
        }
        rows.push(row);
    }

    Ok((Table::new(schema.column_names(), rows), report))
}

fn issue(line: usize, column: &ColumnSpec, value: String, reason: String, action: IssueAction) -> CellIssue {
    CellIssue {
        line,
        column: column.name.clone(),
        value,
        reason,
        action,
    }
}

/// Applies `on_invalid` and then the missing-value policy to a cell that
/// failed coercion. Returns the outcome and the action to report, if the
/// failure was absorbed.
fn resolve_invalid(
    column: &ColumnSpec,
    fill_values: &BTreeMap<String, Value>,
    (line, raw, reason): (usize, &str, &str),
    row_fatal: &mut Vec<CellFailure>,
) -> (CellOutcome, Option<IssueAction>) {
    if column.on_invalid == InvalidPolicy::DropRow
        || column.missing == Some(MissingPolicy::DropRow)
    {
        return (CellOutcome::DropRow, Some(IssueAction::RowDropped));
    }
    if let Some(fill) = fill_values.get(&column.name) {
        return match coerce_value(fill, column) {
            Ok(value) => (CellOutcome::Value(Some(value)), Some(IssueAction::Filled)),
            Err(fill_reason) => {
                row_fatal.push(CellFailure {
                    line,
                    column: column.name.clone(),
                    value: fill.as_display(),
                    reason: format!("fill value is invalid: {fill_reason}"),
                });
                (CellOutcome::Value(None), None)
            }
        };
    }
    if column.nullable() {
        return (CellOutcome::Value(None), Some(IssueAction::Nulled));
    }
    row_fatal.push(CellFailure {
        line,
        column: column.name.clone(),
        value: raw.to_string(),
        reason: reason.to_string(),
    });
    (CellOutcome::Value(None), None)
}

/// Coerces one value to the column's semantic type.
pub fn coerce_value(value: &Value, column: &ColumnSpec) -> Result<Value, String> {
    let text = value.as_display();
    match column.semantic {
        SemanticType::Integer => parse_whole_number(&text)
            .map(Value::Integer)
            .map_err(|err| err.to_string()),
        SemanticType::ForeignKey => {
            let id = parse_whole_number(&text).map_err(|err| err.to_string())?;
            if id < 0 {
                return Err(format!("foreign key '{text}' is negative"));
            }
            Ok(Value::Integer(id))
        }
        SemanticType::Decimal => {
            let parsed = parse_decimal(&text).map_err(|err| err.to_string())?;
            Ok(Value::Decimal(apply_scale(parsed, column.scale)))
        }
        SemanticType::Date => parse_naive_date(&text)
            .map(Value::Date)
            .map_err(|err| err.to_string()),
        SemanticType::Text => Ok(Value::Text(text)),
    }
}

fn apply_scale(value: Decimal, scale: Option<u32>) -> Decimal {
    match scale {
        Some(scale) => {
            let mut rounded =
                value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
            rounded.rescale(scale);
            rounded
        }
        None => value.normalize(),
    }
}

/// A column rule ready to check values. Statistical rules are resolved to
/// fixed bounds over the coerced column first.
enum RuleCheck<'a> {
    Fixed(&'a ValidationRule),
    Bounds {
        rule: &'a ValidationRule,
        low: f64,
        high: f64,
    },
    /// Too few values to estimate a spread; nothing is an outlier.
    Unresolved,
}

impl<'a> RuleCheck<'a> {
    fn resolve<'v, I>(rule: &'a ValidationRule, present: I) -> Self
    where
        I: Iterator<Item = &'v Value>,
    {
        let ValidationRule::Outlier { sigmas } = rule else {
            return RuleCheck::Fixed(rule);
        };
        match outlier_bounds(present.filter_map(Value::as_decimal), *sigmas) {
            Some((low, high)) => RuleCheck::Bounds { rule, low, high },
            None => RuleCheck::Unresolved,
        }
    }

    fn satisfied_by(&self, value: &Value) -> bool {
        match self {
            RuleCheck::Fixed(rule) => satisfies(rule, value),
            RuleCheck::Bounds { low, high, .. } => value
                .as_decimal()
                .and_then(|number| number.to_f64())
                .is_some_and(|number| number >= *low && number <= *high),
            RuleCheck::Unresolved => true,
        }
    }

    fn violation(&self) -> String {
        match self {
            RuleCheck::Fixed(rule) => format!("outside {}", rule.describe()),
            RuleCheck::Bounds { rule, low, high } => {
                format!("outside [{low:.2}, {high:.2}], {}", rule.describe())
            }
            RuleCheck::Unresolved => String::new(),
        }
    }
}

/// Mean plus or minus `sigmas` sample standard deviations.
fn outlier_bounds<I: Iterator<Item = Decimal>>(values: I, sigmas: Decimal) -> Option<(f64, f64)> {
    let values = values.filter_map(|v| v.to_f64()).collect::<Vec<_>>();
    if values.len() < 2 {
        return None;
    }
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1.0);
    let spread = variance.sqrt() * sigmas.to_f64()?;
    Some((mean - spread, mean + spread))
}

fn satisfies(rule: &ValidationRule, value: &Value) -> bool {
    match rule {
        ValidationRule::Range { min, max } => match value.as_decimal() {
            Some(number) => {
                min.is_none_or(|lo| number >= lo) && max.is_none_or(|hi| number <= hi)
            }
            None => false,
        },
        ValidationRule::Positive => value.as_decimal().is_some_and(|number| number > Decimal::ZERO),
        ValidationRule::OneOf { values } => {
            let display = value.as_display();
            values.iter().any(|allowed| allowed.eq_ignore_ascii_case(&display))
        }
        ValidationRule::Outlier { .. } => true,
    }
}

use std::fmt;

use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tokens that mean "no value" in raw extracts. `0` is deliberately absent.
const PLACEHOLDER_TOKENS: &[&str] = &["?", "na", "n/a", "null", "none", "nan", "-"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%m-%d-%Y",
    "%Y%m%d",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Value {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
}

pub type Cell = Option<Value>;

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view used by range rules and statistical fills.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            Value::Text(s) => parse_decimal(s).ok(),
            Value::Date(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn display_cell(cell: &Cell) -> String {
    cell.as_ref().map(Value::as_display).unwrap_or_default()
}

/// Turns a raw field into a cell: trimmed text, or `None` for blanks and
/// placeholder tokens.
pub fn raw_cell(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() || is_placeholder_token(trimmed) {
        None
    } else {
        Some(Value::Text(trimmed.to_string()))
    }
}

pub fn is_placeholder_token(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    PLACEHOLDER_TOKENS.contains(&lowered.as_str())
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    // Timestamps keep only their date part.
    if let Some((date, _)) = trimmed.split_once(['T', ' '])
        && let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d")
    {
        return Ok(parsed);
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

/// Parses money-like text: optional leading `$`, optional `,` thousand
/// separators, optional parentheses for negatives.
pub fn parse_decimal(value: &str) -> Result<Decimal> {
    let trimmed = value.trim();
    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner.trim()),
        None => (false, trimmed),
    };
    let (sign, body) = match body.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", body),
    };
    let body = body.strip_prefix('$').unwrap_or(body);
    let cleaned: String = body.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        bail!("Failed to parse '{value}' as decimal");
    }
    let parsed = if cleaned.contains(['e', 'E']) {
        Decimal::from_scientific(&format!("{sign}{cleaned}"))
    } else {
        format!("{sign}{cleaned}").parse::<Decimal>()
    }
    .map_err(|_| anyhow!("Failed to parse '{value}' as decimal"))?;
    Ok(if negative { -parsed } else { parsed })
}

/// Parses a whole number; `"12.0"` is accepted, `"12.5"` is not.
pub fn parse_whole_number(value: &str) -> Result<i64> {
    let trimmed = value.trim();
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return Ok(parsed);
    }
    let decimal = parse_decimal(trimmed).map_err(|_| anyhow!("'{value}' is not a number"))?;
    if !decimal.fract().is_zero() {
        bail!("'{value}' is not a whole number");
    }
    i64::try_from(decimal.trunc()).map_err(|_| anyhow!("'{value}' is out of integer range"))
}

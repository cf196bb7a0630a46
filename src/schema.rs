//! Schema Descriptor model, validation, and YAML persistence.
//!
//! A [`Schema`] declares, once per dataset, what a prepared record looks
//! like: the ordered target columns, their semantic types, nullability,
//! missing-value policy, invalid-value policy, validation rules, and an
//! optional controlled vocabulary. The scrubbing stages never infer types;
//! everything they enforce comes from here.
//!
//! ```yaml
//! dataset: sales
//! natural_key: [sale_id]
//! columns:
//!   - name: campaign_id
//!     type: foreign_key
//!     nullable: false
//!     missing: { policy: fill_with, value: "0" }
//!   - name: discount_percent
//!     type: decimal
//!     scale: 2
//!     rules: [{ kind: range, min: 0, max: 100 }]
//! ```

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{columns::canonical_name, error::SchemaError};

pub const CURRENT_SCHEMA_VERSION: &str = "1.0";

/// Text used by `fill_default` for text columns.
pub const DEFAULT_TEXT_FILL: &str = "Unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Integer,
    ForeignKey,
    Decimal,
    Date,
    Text,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Integer => "integer",
            SemanticType::ForeignKey => "foreign_key",
            SemanticType::Decimal => "decimal",
            SemanticType::Date => "date",
            SemanticType::Text => "text",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SemanticType::Integer | SemanticType::ForeignKey | SemanticType::Decimal
        )
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "policy", content = "value", rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Remove rows whose cell is missing.
    DropRow,
    /// Fill with a literal, coerced later like any raw value.
    FillWith(String),
    /// Fill with the type's default: `0` for numbers, `Unknown` for text.
    FillDefault,
    /// Fill with the median of the present values (numeric columns only).
    FillMedian,
    /// Fill with the most frequent present value, first seen on ties.
    FillMode,
}

impl MissingPolicy {
    pub fn is_fill(&self) -> bool {
        !matches!(self, MissingPolicy::DropRow)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvalidPolicy {
    DropRow,
    #[default]
    SetNull,
}

impl InvalidPolicy {
    fn is_default(&self) -> bool {
        *self == InvalidPolicy::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationRule {
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<Decimal>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<Decimal>,
    },
    /// Strictly greater than zero.
    Positive,
    OneOf {
        values: Vec<String>,
    },
    /// Within `sigmas` sample standard deviations of the column mean.
    Outlier { sigmas: Decimal },
}

impl ValidationRule {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationRule::Range { .. } => "range",
            ValidationRule::Positive => "positive",
            ValidationRule::OneOf { .. } => "one_of",
            ValidationRule::Outlier { .. } => "outlier",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ValidationRule::Range { min, max } => {
                let lower = min.map(|m| m.to_string()).unwrap_or_else(|| "-inf".into());
                let upper = max.map(|m| m.to_string()).unwrap_or_else(|| "+inf".into());
                format!("[{lower}, {upper}]")
            }
            ValidationRule::Positive => "(0, +inf]".to_string(),
            ValidationRule::OneOf { values } => format!("one of {{{}}}", values.join(", ")),
            ValidationRule::Outlier { sigmas } => {
                format!("{sigmas} standard deviations from the mean")
            }
        }
    }
}

/// Controlled vocabulary for a categorical column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Vocabulary {
    pub canonical: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub synonyms: BTreeMap<String, String>,
}

impl Vocabulary {
    pub fn new<I, S>(canonical: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            canonical: canonical.into_iter().map(Into::into).collect(),
            synonyms: BTreeMap::new(),
        }
    }

    pub fn synonym(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.synonyms.insert(from.into(), to.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub semantic: SemanticType,
    /// Omitted in YAML: foreign keys are required, everything else nullable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<MissingPolicy>,
    #[serde(default, skip_serializing_if = "InvalidPolicy::is_default")]
    pub on_invalid: InvalidPolicy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocabulary: Option<Vocabulary>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, semantic: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic,
            nullable: None,
            scale: None,
            aliases: Vec::new(),
            missing: None,
            on_invalid: InvalidPolicy::default(),
            rules: Vec::new(),
            vocabulary: None,
        }
    }

    pub fn nullable(&self) -> bool {
        self.nullable
            .unwrap_or(self.semantic != SemanticType::ForeignKey)
    }

    pub fn set_nullable(&mut self, nullable: bool) {
        self.nullable = Some(nullable);
    }

    pub fn required(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn missing(mut self, policy: MissingPolicy) -> Self {
        self.missing = Some(policy);
        self
    }

    pub fn on_invalid(mut self, policy: InvalidPolicy) -> Self {
        self.on_invalid = policy;
        self
    }

    pub fn range(mut self, min: Option<Decimal>, max: Option<Decimal>) -> Self {
        self.rules.push(ValidationRule::Range { min, max });
        self
    }

    pub fn positive(mut self) -> Self {
        self.rules.push(ValidationRule::Positive);
        self
    }

    pub fn outlier(mut self, sigmas: Decimal) -> Self {
        self.rules.push(ValidationRule::Outlier { sigmas });
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push(ValidationRule::OneOf {
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    pub fn is_foreign_key(&self) -> bool {
        self.semantic == SemanticType::ForeignKey
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub dataset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub natural_key: Vec<String>,
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(dataset: impl Into<String>, natural_key: &[&str], columns: Vec<ColumnSpec>) -> Self {
        Self {
            dataset: dataset.into(),
            schema_version: Some(CURRENT_SCHEMA_VERSION.to_string()),
            natural_key: natural_key.iter().map(|k| k.to_string()).collect(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Target column that a canonical source name renames to, if any.
    /// Aliases match in canonical form, so `TransactionID` and
    /// `transaction_id` are the same alias.
    pub fn alias_target(&self, canonical: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.aliases.iter().any(|a| canonical_name(a) == canonical))
            .map(|c| c.name.as_str())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema: Schema = serde_yaml::from_reader(reader).context("Parsing schema YAML")?;
        schema
            .validate()
            .with_context(|| format!("Validating schema file {path:?}"))?;
        Ok(schema)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing schema to YAML string")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }

    fn invalid(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidDescriptor {
            dataset: self.dataset.clone(),
            reason: reason.into(),
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(self.invalid("no columns declared"));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(self.invalid(format!("column '{}' declared twice", column.name)));
            }
        }
        let mut alias_owner: BTreeMap<String, &str> = BTreeMap::new();
        for column in &self.columns {
            for alias in column.aliases.iter().map(|a| canonical_name(a)) {
                if seen.contains(alias.as_str()) {
                    return Err(self.invalid(format!(
                        "alias '{alias}' of '{}' collides with a declared column",
                        column.name
                    )));
                }
                if let Some(owner) = alias_owner.insert(alias.clone(), column.name.as_str()) {
                    return Err(self.invalid(format!(
                        "alias '{alias}' claimed by both '{owner}' and '{}'",
                        column.name
                    )));
                }
            }
            self.validate_column(column)?;
        }
        for key in &self.natural_key {
            if !seen.contains(key.as_str()) {
                return Err(self.invalid(format!("natural key column '{key}' is not declared")));
            }
        }
        Ok(())
    }

    fn validate_column(&self, column: &ColumnSpec) -> Result<(), SchemaError> {
        let name = &column.name;
        if column.is_foreign_key() && column.nullable() {
            return Err(self.invalid(format!("foreign key '{name}' cannot be nullable")));
        }
        if column.scale.is_some() && column.semantic != SemanticType::Decimal {
            return Err(self.invalid(format!("scale is only valid on decimal column '{name}'")));
        }
        match (&column.missing, column.semantic) {
            (Some(MissingPolicy::FillDefault), SemanticType::Date) => {
                return Err(self.invalid(format!(
                    "date column '{name}' has no type default; use fill_with or drop_row"
                )));
            }
            (Some(MissingPolicy::FillMedian), semantic) if !semantic.is_numeric() => {
                return Err(self.invalid(format!(
                    "fill_median requires a numeric column but '{name}' is {semantic}"
                )));
            }
            _ => {}
        }
        for rule in &column.rules {
            match rule {
                ValidationRule::Range { .. }
                | ValidationRule::Positive
                | ValidationRule::Outlier { .. }
                    if !column.semantic.is_numeric() =>
                {
                    return Err(self.invalid(format!(
                        "{} rule requires a numeric column but '{name}' is {}",
                        rule.kind(),
                        column.semantic
                    )));
                }
                ValidationRule::Range {
                    min: Some(lo),
                    max: Some(hi),
                } if lo > hi => {
                    return Err(self.invalid(format!("range on '{name}' has min > max")));
                }
                ValidationRule::OneOf { values } if values.is_empty() => {
                    return Err(self.invalid(format!("one_of rule on '{name}' lists no values")));
                }
                ValidationRule::Outlier { sigmas } if *sigmas <= Decimal::ZERO => {
                    return Err(self.invalid(format!("outlier rule on '{name}' needs sigmas > 0")));
                }
                _ => {}
            }
        }
        if let Some(vocabulary) = &column.vocabulary {
            if column.semantic != SemanticType::Text {
                return Err(self.invalid(format!("vocabulary requires text column '{name}'")));
            }
            if let Some((from, to)) = vocabulary
                .synonyms
                .iter()
                .find(|(_, to)| !vocabulary.canonical.contains(to))
            {
                return Err(self.invalid(format!(
                    "synonym '{from}' on '{name}' targets '{to}' which is not canonical"
                )));
            }
        }
        Ok(())
    }
}

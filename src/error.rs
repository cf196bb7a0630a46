//! Error taxonomy for the scrubbing pipeline.
//!
//! [`SchemaError`] covers structural problems (missing, ambiguous or
//! duplicated columns, invalid descriptors) and always aborts a run.
//! [`CoercionError`] is raised when required cells cannot be coerced and no
//! drop or fill policy absorbs the failure. Everything else that goes wrong
//! with individual values is recorded in the scrub report instead.

use std::fmt;

use itertools::Itertools;
use thiserror::Error;

/// Structural problems with a table or a schema descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two source columns standardize to the same canonical name.
    #[error("columns '{first}' and '{second}' both map to '{canonical}'")]
    AmbiguousColumn {
        first: String,
        second: String,
        canonical: String,
    },

    /// A column declared by the descriptor is absent from the table.
    #[error("required column '{column}' not found in {dataset} input")]
    MissingColumn { dataset: String, column: String },

    /// A natural-key column is absent from the table.
    #[error("key column '{column}' not found")]
    MissingKeyColumn { column: String },

    /// The descriptor itself is inconsistent.
    #[error("invalid schema descriptor for {dataset}: {reason}")]
    InvalidDescriptor { dataset: String, reason: String },
}

/// One cell that could not be coerced to its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFailure {
    pub line: usize,
    pub column: String,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for CellFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {} column '{}' value '{}': {}",
            self.line, self.column, self.value, self.reason
        )
    }
}

/// Required cells that stayed invalid or empty after every applicable policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{} cell(s) failed coercion in {}: {}",
    .failures.len(),
    .dataset,
    .failures.iter().take(5).join("; ")
)]
pub struct CoercionError {
    pub dataset: String,
    pub failures: Vec<CellFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrubError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

impl ScrubError {
    pub fn is_schema(&self) -> bool {
        matches!(self, ScrubError::Schema(_))
    }
}

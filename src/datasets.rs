//! Built-in Schema Descriptors for the three retail extracts.

use std::{fmt, path::Path};

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use rust_decimal::Decimal;

use crate::schema::{ColumnSpec, InvalidPolicy, MissingPolicy, Schema, SemanticType, Vocabulary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum Dataset {
    Customers,
    Products,
    Sales,
}

impl Dataset {
    /// Preparation order: dimensions before facts.
    pub const ALL: [Dataset; 3] = [Dataset::Customers, Dataset::Products, Dataset::Sales];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Customers => "customers",
            Dataset::Products => "products",
            Dataset::Sales => "sales",
        }
    }

    /// Warehouse table the prepared rows land in.
    pub fn table_name(&self) -> &'static str {
        match self {
            Dataset::Customers => "customer",
            Dataset::Products => "product",
            Dataset::Sales => "sale",
        }
    }

    pub fn raw_file_name(&self) -> String {
        format!("{}.csv", self.name())
    }

    pub fn prepared_file_name(&self) -> String {
        format!("{}_prepared.csv", self.name())
    }

    pub fn report_file_name(&self) -> String {
        format!("{}_report.json", self.name())
    }

    pub fn schema(&self) -> Schema {
        match self {
            Dataset::Customers => customer_schema(),
            Dataset::Products => product_schema(),
            Dataset::Sales => sale_schema(),
        }
    }

    /// Built-in descriptor, or the one in `override_path` when given. An
    /// override must describe this dataset.
    pub fn resolve_schema(&self, override_path: Option<&Path>) -> Result<Schema> {
        let Some(path) = override_path else {
            return Ok(self.schema());
        };
        let schema = Schema::load(path)
            .with_context(|| format!("Loading {} schema override", self.name()))?;
        if schema.dataset != self.name() {
            bail!(
                "Schema file {path:?} describes dataset '{}', expected '{}'",
                schema.dataset,
                self.name()
            );
        }
        Ok(schema)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Loyalty points further than this many standard deviations from the mean
/// are outliers.
pub const OUTLIER_SIGMAS: Decimal = Decimal::from_parts(3, 0, 0, false, 0);

pub fn region_vocabulary() -> Vocabulary {
    Vocabulary::new(["North", "South", "East", "West", "South-West", "Central"])
        .synonym("Southwest", "South-West")
        .synonym("SW", "South-West")
}

pub fn engagement_vocabulary() -> Vocabulary {
    Vocabulary::new(["Mobile", "Desktop", "InStore"])
        .synonym("Kiosk", "InStore")
        .synonym("Tablet", "Mobile")
        .synonym("Web", "Desktop")
}

pub fn customer_schema() -> Schema {
    Schema::new(
        "customers",
        &["customer_id"],
        vec![
            ColumnSpec::new("customer_id", SemanticType::Integer)
                .required()
                .missing(MissingPolicy::DropRow)
                .on_invalid(InvalidPolicy::DropRow),
            ColumnSpec::new("region", SemanticType::Text).vocabulary(region_vocabulary()),
            ColumnSpec::new("join_date", SemanticType::Date),
            ColumnSpec::new("loyalty_points", SemanticType::Integer)
                .missing(MissingPolicy::FillMedian)
                .range(Some(Decimal::ZERO), None)
                .outlier(OUTLIER_SIGMAS),
            ColumnSpec::new("engagement_style", SemanticType::Text)
                .missing(MissingPolicy::FillMode)
                .vocabulary(engagement_vocabulary()),
        ],
    )
}

pub fn product_schema() -> Schema {
    Schema::new(
        "products",
        &["product_id"],
        vec![
            ColumnSpec::new("product_id", SemanticType::Integer)
                .required()
                .missing(MissingPolicy::DropRow)
                .on_invalid(InvalidPolicy::DropRow),
            ColumnSpec::new("product_name", SemanticType::Text),
            ColumnSpec::new("category", SemanticType::Text).missing(MissingPolicy::FillDefault),
            ColumnSpec::new("unit_price", SemanticType::Decimal)
                .scale(2)
                .range(Some(Decimal::ZERO), None),
        ],
    )
}

pub fn sale_schema() -> Schema {
    let fk = |name: &str| {
        ColumnSpec::new(name, SemanticType::ForeignKey).missing(MissingPolicy::DropRow)
    };
    Schema::new(
        "sales",
        &["sale_id"],
        vec![
            ColumnSpec::new("sale_id", SemanticType::Integer)
                .alias("transaction_id")
                .required()
                .missing(MissingPolicy::DropRow)
                .on_invalid(InvalidPolicy::DropRow),
            fk("customer_id"),
            fk("product_id"),
            fk("store_id"),
            ColumnSpec::new("campaign_id", SemanticType::ForeignKey)
                .missing(MissingPolicy::FillWith("0".to_string())),
            ColumnSpec::new("sale_amount", SemanticType::Decimal)
                .scale(2)
                .required()
                .missing(MissingPolicy::DropRow)
                .positive(),
            ColumnSpec::new("sale_date", SemanticType::Date)
                .required()
                .missing(MissingPolicy::DropRow),
            ColumnSpec::new("discount_percent", SemanticType::Decimal)
                .scale(2)
                .missing(MissingPolicy::FillWith("0".to_string()))
                .range(Some(Decimal::ZERO), Some(Decimal::ONE_HUNDRED)),
        ],
    )
}

//! Warehouse Loader: repopulates the SQLite warehouse from prepared files.
//!
//! Every load replaces the full contents of the five tables inside one
//! transaction, so a failed load leaves the previous contents in place and a
//! repeated load yields the same tables. Foreign keys are declared but not
//! enforced: `campaign_id = 0` means "no campaign" and has no campaign row.

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::UTF_8;
use log::{debug, info};
use rusqlite::{Connection, Transaction, params, params_from_iter, types::Value as SqlValue};
use rust_decimal::prelude::ToPrimitive;

use crate::{
    coerce::coerce_value,
    data::{Cell, Value},
    datasets::Dataset,
    io_utils::DEFAULT_CSV_DELIMITER,
    table::Table,
};

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS customer (
        customer_id      INTEGER PRIMARY KEY,
        region           TEXT,
        join_date        TEXT,
        loyalty_points   INTEGER,
        engagement_style TEXT
    );
    CREATE TABLE IF NOT EXISTS product (
        product_id   INTEGER PRIMARY KEY,
        product_name TEXT,
        category     TEXT,
        unit_price   REAL
    );
    CREATE TABLE IF NOT EXISTS store (
        store_id   INTEGER PRIMARY KEY,
        store_name TEXT,
        region     TEXT
    );
    CREATE TABLE IF NOT EXISTS campaign (
        campaign_id   INTEGER PRIMARY KEY,
        campaign_name TEXT,
        start_date    TEXT,
        end_date      TEXT
    );
    CREATE TABLE IF NOT EXISTS sale (
        sale_id          INTEGER PRIMARY KEY,
        customer_id      INTEGER NOT NULL,
        product_id       INTEGER NOT NULL,
        store_id         INTEGER NOT NULL,
        campaign_id      INTEGER NOT NULL,
        sale_amount      REAL,
        sale_date        TEXT,
        discount_percent REAL,
        FOREIGN KEY (customer_id) REFERENCES customer (customer_id),
        FOREIGN KEY (product_id) REFERENCES product (product_id),
        FOREIGN KEY (store_id) REFERENCES store (store_id),
        FOREIGN KEY (campaign_id) REFERENCES campaign (campaign_id)
    );
"#;

pub const TABLES: [&str; 5] = ["customer", "product", "store", "campaign", "sale"];

pub const STORES: [(i64, &str, &str); 4] = [
    (401, "Los Angeles Plaza", "West"),
    (402, "Phoenix Outfitters", "South-West"),
    (403, "Downtown Seattle", "North"),
    (404, "New York Uptown", "East"),
];

pub const CAMPAIGNS: [(i64, &str, &str, &str); 4] = [
    (1, "Holiday Promo", "2025-11-01", "2025-12-31"),
    (2, "Back to School", "2025-08-01", "2025-09-15"),
    (3, "New Year Kickoff", "2025-01-01", "2025-01-31"),
    (4, "Summer Sale", "2025-06-01", "2025-07-31"),
];

/// Warehouse columns per dataset, in insert order.
pub fn table_columns(dataset: Dataset) -> &'static [&'static str] {
    match dataset {
        Dataset::Customers => &[
            "customer_id",
            "region",
            "join_date",
            "loyalty_points",
            "engagement_style",
        ],
        Dataset::Products => &["product_id", "product_name", "category", "unit_price"],
        Dataset::Sales => &[
            "sale_id",
            "customer_id",
            "product_id",
            "store_id",
            "campaign_id",
            "sale_amount",
            "sale_date",
            "discount_percent",
        ],
    }
}

pub struct Warehouse {
    conn: Connection,
}

impl Warehouse {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating warehouse directory {parent:?}"))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("Opening warehouse {path:?}"))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("Opening in-memory warehouse")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = OFF;")
            .context("Configuring warehouse connection")?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Creating warehouse tables")?;
        Ok(Self { conn })
    }

    /// Replaces the warehouse contents with the prepared files in
    /// `prepared_dir` plus the store and campaign reference rows.
    pub fn load(&mut self, prepared_dir: &Path) -> Result<BTreeMap<String, i64>> {
        let batches = Dataset::ALL
            .iter()
            .map(|&dataset| {
                let path = prepared_dir.join(dataset.prepared_file_name());
                read_prepared(dataset, &path)
                    .with_context(|| format!("Reading prepared {dataset} data from {path:?}"))
                    .map(|rows| (dataset, rows))
            })
            .collect::<Result<Vec<_>>>()?;

        let tx = self
            .conn
            .transaction()
            .context("Starting warehouse transaction")?;
        for table in TABLES {
            tx.execute(&format!("DELETE FROM {table}"), [])
                .with_context(|| format!("Clearing table {table}"))?;
        }
        insert_reference_rows(&tx)?;
        for (dataset, rows) in &batches {
            insert_rows(&tx, *dataset, rows)?;
        }
        tx.commit().context("Committing warehouse load")?;

        let counts = self.table_counts()?;
        for (table, count) in &counts {
            info!("Warehouse table '{table}' holds {count} row(s)");
        }
        Ok(counts)
    }

    pub fn table_counts(&self) -> Result<BTreeMap<String, i64>> {
        TABLES
            .iter()
            .map(|table| {
                let count: i64 = self
                    .conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                    .with_context(|| format!("Counting rows in {table}"))?;
                Ok((table.to_string(), count))
            })
            .collect()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn insert_reference_rows(tx: &Transaction<'_>) -> Result<()> {
    for (id, name, region) in STORES {
        tx.execute(
            "INSERT INTO store (store_id, store_name, region) VALUES (?1, ?2, ?3)",
            params![id, name, region],
        )
        .with_context(|| format!("Inserting store {id}"))?;
    }
    for (id, name, start, end) in CAMPAIGNS {
        tx.execute(
            "INSERT INTO campaign (campaign_id, campaign_name, start_date, end_date) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, start, end],
        )
        .with_context(|| format!("Inserting campaign {id}"))?;
    }
    Ok(())
}

fn insert_rows(tx: &Transaction<'_>, dataset: Dataset, rows: &[Vec<SqlValue>]) -> Result<()> {
    let columns = table_columns(dataset);
    let placeholders = (1..=columns.len())
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        dataset.table_name(),
        columns.join(", ")
    );
    let mut stmt = tx
        .prepare(&sql)
        .with_context(|| format!("Preparing insert into {}", dataset.table_name()))?;
    for (idx, row) in rows.iter().enumerate() {
        stmt.execute(params_from_iter(row.iter()))
            .with_context(|| format!("Inserting {dataset} row {}", idx + 1))?;
    }
    debug!("Inserted {} row(s) into {}", rows.len(), dataset.table_name());
    Ok(())
}

/// Reads a prepared file and types its warehouse columns through the
/// dataset's built-in descriptor.
fn read_prepared(dataset: Dataset, path: &Path) -> Result<Vec<Vec<SqlValue>>> {
    if !path.is_file() {
        bail!("Prepared file not found; run the {dataset} preparation first");
    }
    let table = Table::read_csv(path, DEFAULT_CSV_DELIMITER, UTF_8)?;
    let schema = dataset.schema();
    let columns = table_columns(dataset)
        .iter()
        .map(|&name| {
            let idx = table
                .column_index(name)
                .ok_or_else(|| anyhow!("Prepared file is missing column '{name}'"))?;
            Ok((idx, name, schema.column(name)))
        })
        .collect::<Result<Vec<_>>>()?;

    table
        .rows()
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|&(idx, name, spec)| {
                    let cell = match (&row.cells[idx], spec) {
                        (Some(value), Some(spec)) => Some(coerce_value(value, spec).map_err(|reason| {
                            anyhow!("Line {} column '{name}': {reason}", row.line)
                        })?),
                        (cell, _) => cell.clone(),
                    };
                    sql_value(&cell)
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect()
}

fn sql_value(cell: &Cell) -> Result<SqlValue> {
    Ok(match cell {
        None => SqlValue::Null,
        Some(Value::Integer(value)) => SqlValue::Integer(*value),
        Some(Value::Decimal(value)) => SqlValue::Real(
            value
                .to_f64()
                .ok_or_else(|| anyhow!("Decimal {value} does not fit a REAL column"))?,
        ),
        Some(other) => SqlValue::Text(other.as_display()),
    })
}

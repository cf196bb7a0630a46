use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::datasets::Dataset;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Scrub raw retail CSV extracts and load them into the warehouse",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Prepare data/raw/customers.csv
    Customers,
    /// Prepare data/raw/products.csv
    Products,
    /// Prepare data/raw/sales.csv
    Sales,
    /// Prepare customers, products and sales in order
    All,
    /// Load the prepared files into the warehouse database
    Load,
    /// Print the effective Schema Descriptor for a dataset as YAML
    Schema(SchemaArgs),
}

impl Commands {
    pub fn dataset(&self) -> Option<Dataset> {
        match self {
            Commands::Customers => Some(Dataset::Customers),
            Commands::Products => Some(Dataset::Products),
            Commands::Sales => Some(Dataset::Sales),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Project root containing data/raw and data/prepared (defaults to the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
    /// YAML configuration file; command-line flags take precedence over it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Schema Descriptor override: a YAML file, or a directory of <dataset>.yaml files
    #[arg(long, global = true)]
    pub schema: Option<PathBuf>,
    /// Drop rows that violate a validation rule instead of only flagging them
    #[arg(long, global = true)]
    pub strict: bool,
    /// Raw input delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, global = true, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the raw input files (defaults to utf-8)
    #[arg(long = "input-encoding", global = true)]
    pub input_encoding: Option<String>,
    /// Warehouse database path (defaults to data/dw/smart_sales.db under the root)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Dataset whose descriptor should be printed
    #[arg(value_enum)]
    pub dataset: Dataset,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

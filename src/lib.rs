pub mod cli;
pub mod coerce;
pub mod columns;
pub mod config;
pub mod data;
pub mod datasets;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod io_utils;
pub mod missing;
pub mod pipeline;
pub mod prepare;
pub mod report;
pub mod schema;
pub mod table;
pub mod warehouse;

use std::{env, io::Write, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, SchemaArgs},
    config::RunConfig,
    warehouse::Warehouse,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("retail_scrub", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = RunConfig::from_cli(&cli.global)?;
    match &cli.command {
        Commands::Customers | Commands::Products | Commands::Sales => {
            let dataset = cli
                .command
                .dataset()
                .context("Dataset command without a dataset")?;
            prepare::run_dataset(dataset, &config).map(|_| ())
        }
        Commands::All => handle_all(&config),
        Commands::Load => handle_load(&config),
        Commands::Schema(args) => handle_schema(args, &config),
    }
}

fn handle_all(config: &RunConfig) -> Result<()> {
    let prepared = prepare::run_all(config)?;
    let warnings = prepared.iter().filter(|p| p.report.has_warnings()).count();
    info!(
        "Prepared {} dataset(s); {} reported warnings for review",
        prepared.len(),
        warnings
    );
    Ok(())
}

fn handle_load(config: &RunConfig) -> Result<()> {
    let db_path = config.db_path();
    let prepared_dir = config.prepared_dir();
    info!(
        "Loading prepared data from {:?} into {:?}",
        prepared_dir, db_path
    );
    let mut warehouse = Warehouse::open(&db_path)?;
    warehouse
        .load(&prepared_dir)
        .with_context(|| format!("Loading warehouse {db_path:?}"))?;
    Ok(())
}

fn handle_schema(args: &SchemaArgs, config: &RunConfig) -> Result<()> {
    let schema = args
        .dataset
        .resolve_schema(config.schema_override(args.dataset).as_deref())?;
    let yaml = schema.to_yaml_string()?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(yaml.as_bytes())
        .context("Writing schema to stdout")?;
    stdout.flush().context("Flushing stdout")
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}

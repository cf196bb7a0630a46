//! Per-dataset driver: raw file in, prepared file and report out.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use log::{debug, info};

use crate::{
    config::RunConfig,
    datasets::Dataset,
    io_utils,
    pipeline::{ScrubOptions, Scrubber},
    report::{InputInfo, ScrubReport},
    table::Table,
};

/// Where a successful run left its output.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub dataset: Dataset,
    pub prepared_path: PathBuf,
    pub report_path: PathBuf,
    pub report: ScrubReport,
}

/// Scrubs `data/raw/{dataset}.csv` into `data/prepared/`. Output files are
/// only replaced once the whole pipeline has succeeded.
pub fn run_dataset(dataset: Dataset, config: &RunConfig) -> Result<Prepared> {
    let input = config.raw_path(dataset);
    if !input.is_file() {
        return Err(anyhow!("Raw input for {dataset} not found at {input:?}"));
    }
    let delimiter = io_utils::resolve_input_delimiter(&input, config.delimiter);
    let encoding = config.encoding()?;
    info!(
        "[{dataset}] Scrubbing '{}' (delimiter '{}', encoding {}, strict {})",
        input.display(),
        crate::printable_delimiter(delimiter),
        encoding.name(),
        config.strict
    );

    let override_path = config.schema_override(dataset);
    if let Some(path) = &override_path {
        info!("[{dataset}] Using descriptor override {path:?}");
    }
    let schema = dataset.resolve_schema(override_path.as_deref())?;
    let scrubber = Scrubber::new(
        schema,
        ScrubOptions {
            strict: config.strict,
            keep_stages: false,
        },
    )
    .with_context(|| format!("Preparing {dataset} descriptor"))?;

    let sha256 = io_utils::file_sha256(&input)?;
    let raw = Table::read_csv(&input, delimiter, encoding)
        .with_context(|| format!("Reading raw {dataset} data"))?;
    debug!("[{dataset}] Read {} row(s), headers {:?}", raw.len(), raw.headers());

    let outcome = scrubber
        .scrub(&raw)
        .with_context(|| format!("Scrubbing {dataset} data from {input:?}"))?;
    let mut report = outcome.report;
    report.input = Some(InputInfo {
        path: input.display().to_string(),
        sha256,
    });

    let prepared_path = config.prepared_path(dataset);
    let report_path = config.report_path(dataset);
    io_utils::write_atomically(&prepared_path, |writer| outcome.prepared.write_csv(writer))
        .with_context(|| format!("Writing prepared {dataset} data to {prepared_path:?}"))?;
    report
        .save(&report_path)
        .with_context(|| format!("Writing {dataset} scrub report to {report_path:?}"))?;

    report.log_summary();
    info!(
        "[{dataset}] {} prepared row(s) written to {:?}",
        report.output_rows, prepared_path
    );
    Ok(Prepared {
        dataset,
        prepared_path,
        report_path,
        report,
    })
}

/// Prepares every dataset in order, stopping at the first failure.
pub fn run_all(config: &RunConfig) -> Result<Vec<Prepared>> {
    Dataset::ALL
        .iter()
        .map(|&dataset| run_dataset(dataset, config))
        .collect()
}

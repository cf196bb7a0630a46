//! Run configuration.
//!
//! Built in three layers: defaults, then an optional YAML file, then CLI
//! flags. The resulting [`RunConfig`] is passed explicitly to the drivers.
//!
//! ```yaml
//! root: /srv/retail
//! strict: true
//! delimiter: ";"
//! input_encoding: windows-1252
//! schema: schemas/
//! db: /srv/retail/data/dw/smart_sales.db
//! ```

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::Encoding;
use serde::Deserialize;

use crate::{cli, datasets::Dataset, io_utils};

pub const RAW_DIR: &str = "data/raw";
pub const PREPARED_DIR: &str = "data/prepared";
pub const DEFAULT_DB: &str = "data/dw/smart_sales.db";

/// Settings a YAML config file may provide. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub root: Option<PathBuf>,
    pub strict: Option<bool>,
    pub delimiter: Option<String>,
    pub input_encoding: Option<String>,
    pub schema: Option<PathBuf>,
    pub db: Option<PathBuf>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Project root holding `data/raw` and `data/prepared`.
    pub root: PathBuf,
    pub strict: bool,
    /// Raw input delimiter; inferred from the file extension when unset.
    pub delimiter: Option<u8>,
    pub input_encoding: Option<String>,
    /// Descriptor override: a YAML file, or a directory of `{dataset}.yaml`.
    pub schema: Option<PathBuf>,
    pub db: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            strict: false,
            delimiter: None,
            input_encoding: None,
            schema: None,
            db: None,
        }
    }
}

impl RunConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Resolves the configuration for a CLI invocation.
    pub fn from_cli(args: &cli::GlobalArgs) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = &args.config {
            config.merge_file(ConfigFile::load(path)?)?;
        }
        config.merge_cli(args);
        Ok(config)
    }

    pub fn merge_file(&mut self, file: ConfigFile) -> Result<()> {
        if let Some(root) = file.root {
            self.root = root;
        }
        if let Some(strict) = file.strict {
            self.strict = strict;
        }
        if let Some(delimiter) = file.delimiter {
            self.delimiter = Some(
                cli::parse_delimiter(&delimiter)
                    .map_err(|err| anyhow!("Invalid delimiter in config file: {err}"))?,
            );
        }
        if let Some(encoding) = file.input_encoding {
            self.input_encoding = Some(encoding);
        }
        if let Some(schema) = file.schema {
            self.schema = Some(schema);
        }
        if let Some(db) = file.db {
            self.db = Some(db);
        }
        Ok(())
    }

    pub fn merge_cli(&mut self, args: &cli::GlobalArgs) {
        if let Some(root) = &args.root {
            self.root = root.clone();
        }
        if args.strict {
            self.strict = true;
        }
        if args.delimiter.is_some() {
            self.delimiter = args.delimiter;
        }
        if let Some(encoding) = &args.input_encoding {
            self.input_encoding = Some(encoding.clone());
        }
        if let Some(schema) = &args.schema {
            self.schema = Some(schema.clone());
        }
        if let Some(db) = &args.db {
            self.db = Some(db.clone());
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(RAW_DIR)
    }

    pub fn prepared_dir(&self) -> PathBuf {
        self.root.join(PREPARED_DIR)
    }

    pub fn raw_path(&self, dataset: Dataset) -> PathBuf {
        self.raw_dir().join(dataset.raw_file_name())
    }

    pub fn prepared_path(&self, dataset: Dataset) -> PathBuf {
        self.prepared_dir().join(dataset.prepared_file_name())
    }

    pub fn report_path(&self, dataset: Dataset) -> PathBuf {
        self.prepared_dir().join(dataset.report_file_name())
    }

    pub fn db_path(&self) -> PathBuf {
        self.db.clone().unwrap_or_else(|| self.root.join(DEFAULT_DB))
    }

    pub fn encoding(&self) -> Result<&'static Encoding> {
        io_utils::resolve_encoding(self.input_encoding.as_deref())
    }

    /// Override descriptor file for `dataset`, if one is configured. A
    /// directory contributes `{dataset}.yaml` only when that file exists.
    pub fn schema_override(&self, dataset: Dataset) -> Option<PathBuf> {
        let path = self.schema.as_ref()?;
        if path.is_dir() {
            let candidate = path.join(format!("{}.yaml", dataset.name()));
            candidate.is_file().then_some(candidate)
        } else {
            Some(path.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn paths_follow_root() {
        let config = RunConfig::with_root("/srv/retail");
        assert_eq!(
            config.raw_path(Dataset::Sales),
            PathBuf::from("/srv/retail/data/raw/sales.csv")
        );
        assert_eq!(
            config.prepared_path(Dataset::Customers),
            PathBuf::from("/srv/retail/data/prepared/customers_prepared.csv")
        );
        assert_eq!(
            config.db_path(),
            PathBuf::from("/srv/retail/data/dw/smart_sales.db")
        );
    }

    #[test]
    fn file_values_are_overridden_by_cli() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scrub.yaml");
        fs::write(&path, "root: /from/file\nstrict: true\ndelimiter: \";\"\n").unwrap();
        let args = cli::GlobalArgs {
            config: Some(path),
            root: Some(PathBuf::from("/from/cli")),
            ..cli::GlobalArgs::default()
        };
        let config = RunConfig::from_cli(&args).unwrap();
        assert_eq!(config.root, PathBuf::from("/from/cli"));
        assert!(config.strict);
        assert_eq!(config.delimiter, Some(b';'));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scrub.yaml");
        fs::write(&path, "strcit: true\n").unwrap();
        assert!(ConfigFile::load(&path).is_err());
    }

    #[test]
    fn schema_directory_is_searched_per_dataset() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("sales.yaml"), "").unwrap();
        let config = RunConfig {
            schema: Some(dir.path().to_path_buf()),
            ..RunConfig::default()
        };
        assert_eq!(
            config.schema_override(Dataset::Sales),
            Some(dir.path().join("sales.yaml"))
        );
        assert_eq!(config.schema_override(Dataset::Products), None);
    }
}

//! In-memory tabular data threaded through the scrubbing stages.
//!
//! A [`Table`] is never mutated by a stage; each stage builds a new one.
//! Every [`Row`] remembers the line it came from in the raw file (the header
//! is line 1) so report entries can point back at the source.

use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::debug;

use crate::{
    data::{Cell, display_cell, raw_cell},
    io_utils,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line: usize,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(line: usize, cells: Vec<Cell>) -> Self {
        Self { line, cells }
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// Builds a raw table from string fields, numbering rows from line 2.
    pub fn from_raw<H, R, F>(headers: H, records: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = Vec<F>>,
        F: AsRef<str>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let width = headers.len();
        let rows = records
            .into_iter()
            .enumerate()
            .map(|(idx, fields)| {
                let mut cells: Vec<Cell> = fields
                    .iter()
                    .take(width)
                    .map(|field| raw_cell(field.as_ref()))
                    .collect();
                cells.resize(width, None);
                Row::new(idx + 2, cells)
            })
            .collect();
        Self { headers, rows }
    }

    pub fn read_csv(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let headers = io_utils::reader_headers(&mut reader, encoding)
            .with_context(|| format!("Reading headers from {path:?}"))?;
        let mut records = Vec::new();
        for (idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("Reading row {} in {path:?}", idx + 2))?;
            if record.len() > headers.len() {
                debug!(
                    "Row {} in {:?} has {} field(s); extra fields beyond {} ignored",
                    idx + 2,
                    path,
                    record.len(),
                    headers.len()
                );
            }
            let decoded = io_utils::decode_record(&record, encoding)
                .with_context(|| format!("Decoding row {} in {path:?}", idx + 2))?;
            records.push(decoded);
        }
        Ok(Self::from_raw(headers, records))
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = io_utils::csv_writer(writer);
        csv_writer
            .write_record(&self.headers)
            .context("Writing output headers")?;
        for row in &self.rows {
            csv_writer
                .write_record(row.cells.iter().map(display_cell))
                .with_context(|| format!("Writing row from source line {}", row.line))?;
        }
        csv_writer.flush().context("Flushing output writer")?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).context("Prepared output is not valid UTF-8")
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// All cells of one column, in row order.
    pub fn column<'a>(&'a self, index: usize) -> impl Iterator<Item = &'a Cell> + 'a {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    pub fn with_headers(&self, headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: self.rows.clone(),
        }
    }

    pub fn with_rows(&self, rows: Vec<Row>) -> Self {
        Self {
            headers: self.headers.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use encoding_rs::UTF_8;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn from_raw_pads_short_rows_and_numbers_lines() {
        let table = Table::from_raw(["a", "b"], vec![vec!["1"], vec!["2", " x "]]);
        assert_eq!(table.rows()[0].line, 2);
        assert_eq!(table.rows()[0].cells, vec![Some(Value::text("1")), None]);
        assert_eq!(table.rows()[1].line, 3);
        assert_eq!(table.cell(1, "b"), Some(&Some(Value::text("x"))));
    }

    #[test]
    fn read_csv_decodes_latin1_input() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Name,Region\nJos\xe9,East\n").unwrap();
        let encoding = io_utils::resolve_encoding(Some("latin1")).unwrap();
        let table = Table::read_csv(file.path(), b',', encoding).unwrap();
        assert_eq!(table.cell(0, "Name"), Some(&Some(Value::text("José"))));
    }

    #[test]
    fn write_csv_renders_missing_cells_as_empty() {
        let table = Table::from_raw(["id", "region"], vec![vec!["1", ""], vec!["2", "West"]]);
        assert_eq!(table.to_csv_string().unwrap(), "id,region\n1,\n2,West\n");
    }

    #[test]
    fn read_csv_rejects_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Name\n\xff\xfe\n").unwrap();
        assert!(Table::read_csv(file.path(), b',', UTF_8).is_err());
    }
}

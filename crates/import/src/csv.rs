use std::io::Read;
use thiserror::Error;

use crate::profile::Delimiter;

/// A tokenized statement export: optional header names plus every data row,
/// split but otherwise untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementFile {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl StatementFile {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header name for a column, or its position when the file has none.
    pub fn column_label(&self, index: usize) -> String {
        self.headers
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Column {index}"))
    }
}

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("No data rows")]
    NoDataRows,
}

fn reader<R: Read>(data: R, delimiter: Delimiter, has_header: bool) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(has_header)
        .delimiter(delimiter.as_byte())
        .flexible(true)
        .from_reader(data)
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}

/// Splits a statement into rows. Blank lines are skipped; rows may differ in
/// length since ingestion tolerates short rows.
pub fn read_statement<R: Read>(
    data: R,
    delimiter: Delimiter,
    has_header: bool,
) -> Result<StatementFile, CsvError> {
    let mut reader = reader(data, delimiter, has_header);

    let headers = if has_header {
        reader.headers()?.iter().map(|s| s.trim().to_string()).collect()
    } else {
        Vec::new()
    };

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.is_empty() || is_blank(&record) {
            continue;
        }
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    if rows.is_empty() {
        return Err(CsvError::NoDataRows);
    }
    tracing::debug!(rows = rows.len(), columns = headers.len(), "tokenized statement");

    Ok(StatementFile { headers, rows })
}

/// First line of the file, for building a column mapping by hand.
pub fn detect_columns<R: Read>(data: R, delimiter: Delimiter) -> Result<Vec<String>, CsvError> {
    let mut reader = reader(data, delimiter, false);
    let mut headers = Vec::new();

    if let Some(result) = reader.records().next() {
        let record = result?;
        headers = record.iter().map(|s| s.trim().to_string()).collect();
    }

    Ok(headers)
}

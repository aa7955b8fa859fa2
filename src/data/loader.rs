//! Reads uploaded spreadsheets (first worksheet of an `.xlsx`, or a `.csv`)
//! into a [`Table`]. Header names are trimmed by [`Schema::new`].

use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{Data, ExcelDateTime, Reader, Xlsx};
use chrono::Timelike;
use thiserror::Error;
use tracing::debug;

use super::table::{Schema, Table};
use super::value::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Xlsx,
    Csv,
}

impl SpreadsheetFormat {
    /// Parses a format name or file extension (`xlsx`, `csv`), case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read spreadsheet: {0}")]
    Read(#[from] std::io::Error),
    #[error("unsupported spreadsheet format '{0}' (expected xlsx or csv)")]
    UnknownFormat(String),
    #[error("failed to parse xlsx workbook: {0}")]
    Xlsx(#[from] calamine::XlsxError),
    #[error("failed to parse csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("workbook has no worksheets")]
    NoSheets,
    #[error("spreadsheet has no header row")]
    NoHeader,
}

/// Loads a spreadsheet from disk, picking the format from the extension.
pub fn load_path(path: &Path) -> Result<Table, LoadError> {
    let format = SpreadsheetFormat::from_path(path)
        .ok_or_else(|| LoadError::UnknownFormat(path.display().to_string()))?;
    let bytes = fs::read(path)?;
    load_bytes(&bytes, format)
}

pub fn load_bytes(bytes: &[u8], format: SpreadsheetFormat) -> Result<Table, LoadError> {
    let table = match format {
        SpreadsheetFormat::Xlsx => read_xlsx(Cursor::new(bytes))?,
        SpreadsheetFormat::Csv => read_csv(bytes)?,
    };
    debug!(
        format = format.as_str(),
        columns = table.schema().len(),
        rows = table.len(),
        "spreadsheet loaded"
    );
    Ok(table)
}

/// Worksheet names of an xlsx workbook, in workbook order.
pub fn sheet_names(bytes: &[u8]) -> Result<Vec<String>, LoadError> {
    let workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    Ok(workbook.sheet_names())
}

fn read_xlsx<RS: Read + Seek>(reader: RS) -> Result<Table, LoadError> {
    let mut workbook: Xlsx<_> = Xlsx::new(reader)?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(LoadError::NoSheets)?;
    let range = workbook.worksheet_range(&first)?;

    let mut rows = range.rows();
    let header = rows.next().ok_or(LoadError::NoHeader)?;
    let schema = Schema::new(header.iter().map(|cell| cell_scalar(cell).to_string()));
    let values = rows
        .map(|row| row.iter().map(cell_scalar).collect())
        .collect();
    Ok(Table::new(schema, values))
}

fn read_csv<R: Read>(reader: R) -> Result<Table, LoadError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(LoadError::NoHeader);
    }
    let schema = Schema::new(headers.iter());
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        values.push(record.iter().map(Scalar::infer).collect());
    }
    Ok(Table::new(schema, values))
}

fn cell_scalar(cell: &Data) -> Scalar {
    match cell {
        Data::Empty => Scalar::Missing,
        Data::String(s) if s.trim().is_empty() => Scalar::Missing,
        Data::String(s) => Scalar::Text(s.clone()),
        Data::Float(f) => Scalar::Number(*f),
        Data::Int(i) => Scalar::Number(*i as f64),
        Data::Bool(b) => Scalar::Text(b.to_string()),
        Data::DateTime(dt) => excel_datetime(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Scalar::Text(s.clone()),
        Data::Error(_) => Scalar::Missing,
    }
}

/// Dates become ISO text (`2023-03-15`, or `2023-03-15 08:30:00` when the
/// cell has a time of day). Durations and out-of-range serials keep the raw
/// serial number.
fn excel_datetime(dt: &ExcelDateTime) -> Scalar {
    if !dt.is_datetime() {
        return Scalar::Number(dt.as_f64());
    }
    match dt.as_datetime() {
        Some(value) if value.num_seconds_from_midnight() == 0 => {
            Scalar::Text(value.format("%Y-%m-%d").to_string())
        }
        Some(value) => Scalar::Text(value.format("%Y-%m-%d %H:%M:%S").to_string()),
        None => Scalar::Number(dt.as_f64()),
    }
}

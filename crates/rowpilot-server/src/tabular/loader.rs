//! Spreadsheet loading
//!
//! Dispatches on the file extension:
//!
//! | Extension | Reader                                        |
//! |-----------|-----------------------------------------------|
//! | `xlsx`    | first worksheet via `calamine`, row 1 header  |
//! | `csv`     | comma-separated                               |
//! | `txt`     | tab-separated, retried once as comma-separated |
//!
//! Anything else is rejected before the file is read.

use std::ffi::OsStr;
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::{NaiveDateTime, Timelike};
use rowpilot_common::types::{Scalar, Table};
use rowpilot_common::{Result, RowpilotError};
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Largest float magnitude converted to an integer without losing precision
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Csv,
    Txt,
}

impl SourceFormat {
    /// Resolve a format from an extension, ignoring case
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(SourceFormat::Xlsx),
            "csv" => Ok(SourceFormat::Csv),
            "txt" => Ok(SourceFormat::Txt),
            _ => Err(RowpilotError::UnsupportedFormat {
                extension: extension.to_string(),
            }),
        }
    }

    /// Resolve a format from a file name or path
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        match path.as_ref().extension().and_then(OsStr::to_str) {
            Some(extension) => Self::from_extension(extension),
            None => Err(RowpilotError::UnsupportedFormat {
                extension: "(none)".to_string(),
            }),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Csv => "csv",
            SourceFormat::Txt => "txt",
        }
    }
}

/// Load a spreadsheet into a table, choosing the reader by extension
pub fn load_table(path: &Path) -> Result<Table> {
    let format = SourceFormat::from_path(path)?;
    load_table_as(path, format)
}

/// Load a spreadsheet with an explicit format
pub fn load_table_as(path: &Path, format: SourceFormat) -> Result<Table> {
    let table = match format {
        SourceFormat::Xlsx => read_workbook(path)?,
        SourceFormat::Csv => read_delimited(&std::fs::read(path)?, b',', format.label())?,
        SourceFormat::Txt => {
            let bytes = std::fs::read(path)?;
            read_delimited(&bytes, b'\t', format.label()).or_else(|err| {
                debug!(path = %path.display(), error = %err, "Tab parsing failed, retrying with commas");
                read_delimited(&bytes, b',', format.label())
            })?
        },
    };

    debug!(
        path = %path.display(),
        format = format.label(),
        columns = table.column_count(),
        rows = table.row_count(),
        "Loaded table"
    );

    Ok(table)
}

fn read_delimited(bytes: &[u8], delimiter: u8, format: &'static str) -> Result<Table> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(bytes);

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| RowpilotError::parse(format, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    if header.is_empty() {
        return Err(RowpilotError::parse(format, "no columns to parse from file"));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RowpilotError::parse(format, e.to_string()))?;
        rows.push(record.iter().map(Scalar::infer).collect());
    }

    Table::from_rows(header, rows)
}

fn read_workbook(path: &Path) -> Result<Table> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e| RowpilotError::parse("xlsx", format!("{}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RowpilotError::parse("xlsx", "workbook has no worksheets"))?
        .map_err(|e| RowpilotError::parse("xlsx", e.to_string()))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| RowpilotError::parse("xlsx", "first worksheet is empty"))?
        .iter()
        .map(|cell| match cell {
            Data::Empty => String::new(),
            other => other.to_string(),
        })
        .collect();

    let body = rows
        .map(|row| row.iter().map(cell_to_scalar).collect())
        .collect();

    Table::from_rows(header, body)
}

fn cell_to_scalar(cell: &Data) -> Scalar {
    match cell {
        Data::Empty => Scalar::Null,
        Data::Bool(value) => Scalar::Bool(*value),
        Data::Int(value) => Scalar::Int(*value),
        Data::Float(value) if value.fract() == 0.0 && value.abs() < MAX_EXACT_FLOAT_INT => {
            Scalar::Int(*value as i64)
        },
        Data::Float(value) => Scalar::Float(*value),
        Data::String(value) if value.trim().is_empty() => Scalar::Null,
        Data::String(value) => Scalar::Text(value.clone()),
        Data::DateTime(value) => match value.as_datetime() {
            Some(datetime) if value.is_datetime() => Scalar::Text(format_datetime(datetime)),
            _ => Scalar::Text(value.to_string()),
        },
        Data::DateTimeIso(value) | Data::DurationIso(value) => Scalar::Text(value.clone()),
        other => Scalar::Text(other.to_string()),
    }
}

/// ISO date for midnight values, ISO date and time otherwise
fn format_datetime(datetime: NaiveDateTime) -> String {
    if datetime.num_seconds_from_midnight() == 0 && datetime.nanosecond() == 0 {
        datetime.format("%Y-%m-%d").to_string()
    } else {
        datetime.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

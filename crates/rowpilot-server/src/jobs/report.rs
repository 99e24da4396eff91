//! Job reports
//!
//! A report is a CSV file with one row per processed record: the mapped fields
//! followed by `row_number` (1-based), `status` and `message`. Files are UTF-8
//! with a leading byte-order mark so spreadsheet tools pick the right encoding.
//!
//! Summary statistics are derived from the persisted file, never from job state,
//! so [`summarize_report`] can be exercised on any report on disk.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use rowpilot_common::types::MappedRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ROW_NUMBER_COLUMN: &str = "row_number";
pub const STATUS_COLUMN: &str = "status";
pub const MESSAGE_COLUMN: &str = "message";

/// Columns appended to every report; mapped fields may not reuse these names
pub const RESERVED_COLUMNS: [&str; 3] = [ROW_NUMBER_COLUMN, STATUS_COLUMN, MESSAGE_COLUMN];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Outcome of processing one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Success,
    Error,
}

impl RowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RowStatus::Success => "success",
            RowStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub row_number: usize,
    pub record: MappedRecord,
    pub status: RowStatus,
    pub message: String,
}

/// Deterministic report file name for a job
pub fn report_file_name(job_id: Uuid) -> String {
    format!("report_{}.csv", job_id)
}

/// Render report rows as BOM-prefixed CSV
pub fn render_report(fields: &[String], rows: &[ReportRow]) -> io::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());

    let header = fields
        .iter()
        .map(String::as_str)
        .chain(RESERVED_COLUMNS);
    writer.write_record(header)?;

    for row in rows {
        let mut cells: Vec<String> = fields
            .iter()
            .map(|field| row.record.get(field).map(ToString::to_string).unwrap_or_default())
            .collect();
        cells.push(row.row_number.to_string());
        cells.push(row.status.to_string());
        cells.push(row.message.clone());
        writer.write_record(&cells)?;
    }

    writer.into_inner().map_err(|e| e.into_error())
}

/// Write a job's report into `dir` and return its path
pub async fn write_report(
    dir: &Path,
    job_id: Uuid,
    fields: &[String],
    rows: &[ReportRow],
) -> io::Result<PathBuf> {
    let bytes = render_report(fields, rows)?;
    let path = dir.join(report_file_name(job_id));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

// ============================================================================
// Statistics
// ============================================================================

/// Which report columns get a value breakdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsPolicy {
    /// Identity-like columns that are never summarized, matched case-insensitively
    pub excluded_fields: Vec<String>,
    /// Upper bound on distinct values; a column needs more than one and at most this many
    pub max_distinct: usize,
}

impl Default for StatsPolicy {
    fn default() -> Self {
        Self {
            excluded_fields: ["id", "name", "date", "email"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            max_distinct: 15,
        }
    }
}

impl StatsPolicy {
    fn is_excluded(&self, column: &str) -> bool {
        RESERVED_COLUMNS.contains(&column)
            || self
                .excluded_fields
                .iter()
                .any(|field| field.eq_ignore_ascii_case(column))
    }

    fn is_eligible(&self, distinct: usize) -> bool {
        distinct > 1 && distinct <= self.max_distinct
    }
}

/// Summary of a persisted report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub success: usize,
    pub error: usize,
    /// Value counts for low-cardinality columns
    pub columns: BTreeMap<String, BTreeMap<String, usize>>,
}

/// Summarize report CSV bytes
pub fn summarize(bytes: &[u8], policy: &StatsPolicy) -> io::Result<ReportStats> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::Reader::from_reader(bytes);

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let status_index = header.iter().position(|c| c == STATUS_COLUMN);

    let mut stats = ReportStats::default();
    let mut counts: Vec<BTreeMap<String, usize>> = vec![BTreeMap::new(); header.len()];

    for record in reader.records() {
        let record = record?;

        match status_index.and_then(|i| record.get(i)) {
            Some(status) if status == RowStatus::Success.as_str() => stats.success += 1,
            Some(status) if status == RowStatus::Error.as_str() => stats.error += 1,
            _ => {},
        }

        for (value, histogram) in record.iter().zip(counts.iter_mut()) {
            if !value.is_empty() {
                *histogram.entry(value.to_string()).or_insert(0) += 1;
            }
        }
    }

    stats.columns = header
        .into_iter()
        .zip(counts)
        .filter(|(column, histogram)| {
            !policy.is_excluded(column) && policy.is_eligible(histogram.len())
        })
        .collect();

    Ok(stats)
}

/// Re-read a report file and summarize it
pub fn summarize_report(path: &Path, policy: &StatsPolicy) -> io::Result<ReportStats> {
    let bytes = std::fs::read(path)?;
    summarize(&bytes, policy)
}

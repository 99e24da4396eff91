//! Common types used across Rowpilot

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Result, RowpilotError};

// ============================================================================
// Scalar
// ============================================================================

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Type a raw text cell: blanks are null, numbers are numbers, the rest stays text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Scalar::Null;
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return Scalar::Int(value);
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Scalar::Float(value),
            _ => Scalar::Text(raw.to_string()),
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(value) => write!(f, "{}", value),
            Scalar::Int(value) => write!(f, "{}", value),
            Scalar::Float(value) => write!(f, "{}", value),
            Scalar::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

// ============================================================================
// Table
// ============================================================================

/// A named column of values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Column-oriented table loaded from an uploaded file.
///
/// All columns have the same length; the constructors enforce it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table from columns, rejecting columns of unequal length
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let expected = first.values.len();
            if let Some(ragged) = columns.iter().find(|c| c.values.len() != expected) {
                return Err(RowpilotError::RaggedTable {
                    column: ragged.name.clone(),
                    expected,
                    found: ragged.values.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// Build a table from a header and row-major cells.
    ///
    /// Header names are made unique: a blank name becomes `Unnamed: <index>` and a
    /// repeated name gets a `.1`, `.2`, ... suffix.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<Scalar>>) -> Result<Self> {
        let names = dedupe_header(header);
        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();

        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(RowpilotError::RaggedTable {
                    column: format!("row {}", index + 1),
                    expected: columns.len(),
                    found: row.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.values.push(value);
            }
        }

        Self::new(columns)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    /// Row-major copy of the first `limit` rows
    pub fn preview(&self, limit: usize) -> TablePreview {
        let rows = (0..self.row_count().min(limit))
            .map(|row| self.columns.iter().map(|c| c.values[row].clone()).collect())
            .collect();

        TablePreview {
            columns: self.column_names(),
            rows,
            total_rows: self.row_count(),
        }
    }
}

fn dedupe_header(header: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(header.len());
    for (index, name) in header.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {}", index)
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        seen.push(candidate);
    }
    seen
}

/// Row-major view of a table for display
#[derive(Debug, Clone, Serialize)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
    pub total_rows: usize,
}

// ============================================================================
// Mapped records
// ============================================================================

/// One row projected onto target field names, in field order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappedRecord {
    entries: Vec<(String, Scalar)>,
}

impl MappedRecord {
    pub fn new(entries: Vec<(String, Scalar)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for MappedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl std::fmt::Display for MappedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(std::fmt::Error),
        }
    }
}

/// Records produced by column mapping, sharing one ordered field list
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MappedDataset {
    pub fields: Vec<String>,
    pub records: Vec<MappedRecord>,
}

impl MappedDataset {
    pub fn new(fields: Vec<String>, records: Vec<MappedRecord>) -> Self {
        Self { fields, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

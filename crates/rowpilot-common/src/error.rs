//! Error types for Rowpilot

use thiserror::Error;

/// Result type alias for Rowpilot operations
pub type Result<T> = std::result::Result<T, RowpilotError>;

/// Main error type for Rowpilot
#[derive(Error, Debug)]
pub enum RowpilotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Failed to parse {format} file: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Column '{column}' has {found} values, expected {expected}")]
    RaggedTable {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Select at least one column")]
    EmptySelection,

    #[error("{}", missing_fields_message(.0))]
    MissingFields(Vec<String>),

    #[error("Column not found in uploaded file: {0}")]
    UnknownColumn(String),

    #[error("Field name '{0}' is used more than once")]
    DuplicateField(String),

    #[error("Field name '{0}' is reserved for report columns")]
    ReservedField(String),

    #[error("Invalid row index: {0}")]
    InvalidRowIndex(String),

    #[error("No fixed schema is configured")]
    NoFixedSchema,
}

fn missing_fields_message(fields: &[String]) -> String {
    match fields {
        [field] => format!("Field '{}' must be mapped to a source column", field),
        _ => format!(
            "Fields must be mapped to a source column: {}",
            fields
                .iter()
                .map(|f| format!("'{}'", f))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

impl RowpilotError {
    /// Build a parse error for the given format label
    pub fn parse(format: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            format,
            message: message.into(),
        }
    }
}

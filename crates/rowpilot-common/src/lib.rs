//! Rowpilot Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared domain types, error handling and logging for the Rowpilot workspace.
//!
//! # Overview
//!
//! - **Types**: [`types::Scalar`], [`types::Table`] and [`types::MappedDataset`],
//!   the in-memory shapes an uploaded spreadsheet passes through
//! - **Error Handling**: [`RowpilotError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//!
//! # Example
//!
//! ```
//! use rowpilot_common::types::{Column, Scalar, Table};
//!
//! # fn main() -> rowpilot_common::Result<()> {
//! let table = Table::new(vec![
//!     Column::new("city", vec![Scalar::from("Lisbon"), Scalar::from("Porto")]),
//!     Column::new("visits", vec![Scalar::Int(3), Scalar::Int(5)]),
//! ])?;
//! assert_eq!(table.row_count(), 2);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, RowpilotError};

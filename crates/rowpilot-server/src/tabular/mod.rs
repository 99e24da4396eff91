//! Tabular pipeline
//!
//! The synchronous steps a spreadsheet goes through before a job starts:
//!
//! - **loader**: read `.xlsx`, `.csv` or `.txt` into a [`Table`](rowpilot_common::types::Table)
//! - **mapper**: project the table onto target fields (free selection or fixed schema)
//! - **selector**: keep a user-chosen subset of mapped records
//!
//! Loading is blocking IO; request handlers run it through `spawn_blocking`.

pub mod loader;
pub mod mapper;
pub mod selector;

pub use loader::{load_table, SourceFormat};
pub use mapper::{map_fixed, map_free, ColumnSelection};
pub use selector::{parse_indices, select_rows, SelectionOutcome};

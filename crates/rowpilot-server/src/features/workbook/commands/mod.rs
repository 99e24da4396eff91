//! Workbook commands

pub mod map_columns;
pub mod select_rows;
pub mod upload;

pub use map_columns::{MapColumnsCommand, MapColumnsResponse, MappingMode};
pub use select_rows::{SelectRowsCommand, SelectRowsResponse};
pub use upload::{UploadCommand, UploadResponse};

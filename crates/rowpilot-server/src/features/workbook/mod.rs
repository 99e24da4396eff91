//! Workbook feature module
//!
//! Upload a spreadsheet, map its columns, and pick the rows a job will process.
//! Intermediate results are kept in the caller's session.

pub mod commands;
pub mod form;
pub mod routes;

pub use commands::{
    MapColumnsCommand, MapColumnsResponse, MappingMode, SelectRowsCommand, SelectRowsResponse,
    UploadCommand, UploadResponse,
};
pub use form::FormFields;
pub use routes::workbook_routes;

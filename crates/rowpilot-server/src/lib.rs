//! Rowpilot Server Library
//!
//! HTTP server that turns an uploaded spreadsheet into a background batch job.
//!
//! # Overview
//!
//! A user walks through four steps, all tied to a browser session:
//!
//! 1. **Upload** an `.xlsx`, `.csv` or `.txt` file and see a preview
//! 2. **Map** columns, either picking and renaming them freely or binding a
//!    configured fixed schema
//! 3. **Select** the rows to process
//! 4. **Run** a job over those rows, poll its progress, and download a CSV report
//!
//! # Architecture
//!
//! - [`tabular`]: loading, column mapping and row selection (synchronous)
//! - [`jobs`]: job store, runner, per-row action, and report builder
//! - [`session`]: cookie-based session ids and per-session state
//! - [`features`]: vertical slices (`workbook`, `jobs`) with commands, queries and routes
//! - [`api`]: router assembly and response envelopes
//!
//! ## Framework Stack
//!
//! - **Axum**: web framework
//! - **Tower**: middleware and service abstractions
//! - **calamine** / **csv**: spreadsheet readers and report writer
//!
//! # Example
//!
//! ```no_run
//! use rowpilot_server::{api, config::Config, features::FeatureState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let app = api::create_router(FeatureState::from_config(&config), &config);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod jobs;
pub mod middleware;
pub mod session;
pub mod tabular;

// Re-export commonly used types
pub use error::{AppError, AppResult};

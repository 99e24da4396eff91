//! Jobs feature module
//!
//! Starts jobs over the session's selected records and exposes their progress
//! and reports. Jobs themselves are driven by [`crate::jobs::JobRunner`].

pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::StartJobResponse;
pub use queries::{JobListItem, JobStatusView, ReportFile};
pub use routes::jobs_routes;

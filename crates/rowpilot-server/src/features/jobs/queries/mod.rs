//! Job queries

pub mod download_report;
pub mod get_status;
pub mod list_jobs;

pub use download_report::{DownloadReportQuery, ReportFile};
pub use get_status::{GetStatusQuery, JobStatusView};
pub use list_jobs::JobListItem;

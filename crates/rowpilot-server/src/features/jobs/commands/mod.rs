//! Job commands

pub mod start_job;

pub use start_job::StartJobResponse;

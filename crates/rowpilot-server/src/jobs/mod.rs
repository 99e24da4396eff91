//! Background jobs
//!
//! A job processes a mapped dataset row by row and ends with a CSV report.
//!
//! - **store**: job state, polled by status requests, with bounded retention
//! - **action**: the per-row unit of work
//! - **runner**: spawns jobs on tokio behind a concurrency limit
//! - **report**: report rendering and summary statistics
//!
//! Job state lives in process memory only; jobs in flight are lost on restart.

pub mod action;
pub mod report;
pub mod runner;
pub mod store;

pub use action::{RowAction, SimulatedAction};
pub use report::{summarize_report, ReportStats, RowStatus, StatsPolicy};
pub use runner::JobRunner;
pub use store::{EvictionPolicy, InMemoryJobStore, JobPhase, JobState, JobStore, JobStoreError};

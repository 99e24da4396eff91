//! Feature modules implementing the Rowpilot API
//!
//! Each feature is a vertical slice with its own commands, queries, and routes.
//!
//! # Features
//!
//! - **workbook**: the upload form and its three steps (upload, column mapping,
//!   row selection), all posted to `/`
//! - **jobs**: starting a job over the selected rows, polling it, downloading
//!   its report, and listing known jobs
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Operations that change session or job state
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions
//!
//! Commands and queries expose a `handle` function taking the shared
//! [`FeatureState`], so they can be tested without going through HTTP.

pub mod jobs;
pub mod workbook;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::jobs::{
    EvictionPolicy, InMemoryJobStore, JobRunner, JobStore, RowAction, SimulatedAction,
    StatsPolicy,
};
use crate::session::SessionStore;

/// Shortest period the eviction sweeper will tick at
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Settings the feature handlers read on every request
#[derive(Debug, Clone)]
pub struct FeatureSettings {
    pub upload_dir: PathBuf,
    pub preview_rows: usize,
    /// Ordered target fields for fixed-schema mapping
    pub fixed_fields: Vec<String>,
    pub stats_policy: StatsPolicy,
}

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub sessions: SessionStore,
    pub runner: JobRunner,
    pub settings: Arc<FeatureSettings>,
}

impl FeatureState {
    /// Build the state with the simulated row action
    pub fn from_config(config: &Config) -> Self {
        let action = Arc::new(SimulatedAction::new(config.jobs.row_delay()));
        Self::with_action(config, action)
    }

    /// Build the state with a custom row action
    pub fn with_action(config: &Config, action: Arc<dyn RowAction>) -> Self {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new(EvictionPolicy {
            max_entries: config.jobs.max_entries,
            ttl: config.jobs.ttl(),
        }));

        Self {
            sessions: SessionStore::new(config.jobs.session_ttl()),
            runner: JobRunner::new(
                store,
                action,
                config.jobs.max_concurrent_jobs,
                config.storage.report_dir.clone(),
            ),
            settings: Arc::new(FeatureSettings {
                upload_dir: config.storage.upload_dir.clone(),
                preview_rows: config.mapping.preview_rows,
                fixed_fields: config.mapping.fixed_fields.clone(),
                stats_policy: StatsPolicy {
                    excluded_fields: config.report.stats_excluded_fields.clone(),
                    max_distinct: config.report.stats_max_distinct,
                },
            }),
        }
    }

    /// Evict finished jobs and idle sessions, deleting the files they own
    pub async fn sweep(&self) {
        self.runner.sweep().await;

        let idle = self.sessions.evict_idle(Utc::now()).await;
        for path in idle.iter().filter_map(|data| data.upload_path.as_ref()) {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to delete upload");
                }
            }
        }
        if !idle.is_empty() {
            info!(count = idle.len(), "Evicted idle sessions");
        }
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the runtime shuts down
    ///
    /// Intervals shorter than one second are raised to one second.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                debug!("Running eviction sweep");
                state.sweep().await;
            }
        })
    }
}

/// Creates the router with all feature routes mounted
///
/// - `/` - Upload form and workbook steps
/// - `/start_job`, `/status/:job_id`, `/download_report/:job_id`, `/jobs` - Jobs
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .merge(workbook::workbook_routes())
        .merge(jobs::jobs_routes())
        .with_state(state)
}

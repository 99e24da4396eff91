//! Get job status query
//!
//! Returns the polling view of a job. Unknown ids, including ids that are not
//! valid UUIDs, yield the empty not-started view instead of an error. Stats are
//! re-derived from the report file on every call once it exists.

use serde::Serialize;
use uuid::Uuid;

use crate::features::FeatureState;
use crate::jobs::{summarize_report, ReportStats};

#[derive(Debug, Clone)]
pub struct GetStatusQuery {
    pub job_id: String,
}

/// Polling view of a job
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStatusView {
    pub current: usize,
    pub total: usize,
    pub logs: Vec<String>,
    pub done: bool,
    pub report_path: Option<String>,
    pub stats: ReportStats,
}

#[tracing::instrument(skip(state))]
pub async fn handle(state: &FeatureState, query: GetStatusQuery) -> JobStatusView {
    let Ok(job_id) = Uuid::parse_str(query.job_id.trim()) else {
        return JobStatusView::default();
    };

    let Some(job) = state.runner.store().get(job_id).await else {
        tracing::debug!(job_id = %job_id, "Status requested for unknown job");
        return JobStatusView::default();
    };

    let stats = match job.report_path.clone() {
        Some(path) => {
            let policy = state.settings.stats_policy.clone();
            match tokio::task::spawn_blocking(move || summarize_report(&path, &policy)).await {
                Ok(Ok(stats)) => stats,
                Ok(Err(e)) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Report unreadable");
                    ReportStats::default()
                },
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Stats task failed");
                    ReportStats::default()
                },
            }
        },
        None => ReportStats::default(),
    };

    let done = job.is_done();
    JobStatusView {
        current: job.current,
        total: job.total,
        logs: job.logs,
        done,
        report_path: job.report_path.map(|p| p.display().to_string()),
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_unknown_job_looks_not_started() {
        let state = FeatureState::from_config(&Config::default());

        for job_id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
            let view = handle(&state, GetStatusQuery { job_id }).await;
            assert_eq!(view.current, 0);
            assert_eq!(view.total, 0);
            assert!(!view.done);
            assert!(view.report_path.is_none());
            assert_eq!(view.stats, ReportStats::default());
        }
    }

    #[tokio::test]
    async fn test_queued_job_has_no_stats() {
        let state = FeatureState::from_config(&Config::default());
        let job = state.runner.store().create(4).await;

        let view = handle(&state, GetStatusQuery { job_id: job.id.to_string() }).await;

        assert_eq!(view.total, 4);
        assert!(!view.done);
        assert_eq!(view.stats.success, 0);
    }

    #[tokio::test]
    async fn test_finished_job_reports_done_with_logs() {
        let state = FeatureState::from_config(&Config::default());
        let store = state.runner.store();
        let job = store.create(1).await;
        store.mark_running(job.id).await.unwrap();
        store.record_row(job.id, "row 1: success".to_string()).await.unwrap();
        store.complete(job.id, None).await.unwrap();

        let view = handle(&state, GetStatusQuery { job_id: job.id.to_string() }).await;

        assert!(view.done);
        assert_eq!(view.current, 1);
        assert_eq!(view.logs, vec!["row 1: success".to_string()]);
        assert!(view.report_path.is_none());
    }

    #[test]
    fn test_default_view_shape() {
        let json = serde_json::to_value(JobStatusView::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "current": 0,
                "total": 0,
                "logs": [],
                "done": false,
                "report_path": null,
                "stats": { "success": 0, "error": 0, "columns": {} }
            })
        );
    }
}

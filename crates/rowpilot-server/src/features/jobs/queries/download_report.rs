//! Download report query

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::features::FeatureState;
use crate::jobs::report::report_file_name;

#[derive(Debug, Clone)]
pub struct DownloadReportQuery {
    pub job_id: String,
}

/// A report ready to be sent as an attachment
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

#[tracing::instrument(skip(state))]
pub async fn handle(state: &FeatureState, query: DownloadReportQuery) -> AppResult<ReportFile> {
    let not_available = || AppError::NotFound("Report not available".to_string());

    let job_id = Uuid::parse_str(query.job_id.trim()).map_err(|_| not_available())?;
    let path = state
        .runner
        .store()
        .get(job_id)
        .await
        .and_then(|job| job.report_path)
        .ok_or_else(not_available)?;

    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_available()),
        Err(e) => return Err(e.into()),
    };

    Ok(ReportFile {
        file_name: report_file_name(job_id),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_unfinished_job_has_no_report() {
        let state = FeatureState::from_config(&Config::default());
        let job = state.runner.store().create(1).await;

        let result = handle(&state, DownloadReportQuery { job_id: job.id.to_string() }).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_deleted_report_file_is_not_found() {
        let state = FeatureState::from_config(&Config::default());
        let job = state.runner.store().create(0).await;
        state
            .runner
            .store()
            .complete(job.id, Some(PathBuf::from("/nonexistent/report.csv")))
            .await
            .unwrap();

        let result = handle(&state, DownloadReportQuery { job_id: job.id.to_string() }).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_id_is_not_found() {
        let state = FeatureState::from_config(&Config::default());
        let result = handle(&state, DownloadReportQuery { job_id: "../etc".to_string() }).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}

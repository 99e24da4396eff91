//! List jobs query

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::features::FeatureState;
use crate::jobs::{JobPhase, JobState};

/// Job list item
#[derive(Debug, Clone, Serialize)]
pub struct JobListItem {
    pub id: Uuid,
    pub state: JobPhase,
    pub current: usize,
    pub total: usize,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<JobState> for JobListItem {
    fn from(job: JobState) -> Self {
        Self {
            id: job.id,
            state: job.phase,
            current: job.current,
            total: job.total,
            created_at: job.created_at,
            finished_at: job.finished_at,
        }
    }
}

/// Jobs still held by the store, newest first
pub async fn handle(state: &FeatureState) -> Vec<JobListItem> {
    state
        .runner
        .store()
        .list()
        .await
        .into_iter()
        .map(JobListItem::from)
        .collect()
}
